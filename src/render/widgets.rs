//! Form control selection: a lookup table from field kind to widget builder,
//! with a named table for per-field overrides.

use crate::config::{FieldDescriptor, FieldKind};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    Text,
    TextArea,
    Email,
    Number,
    Checkbox,
    Date,
    Select { options: Vec<String> },
    Json,
    Hidden,
    /// Foreign key input pointing at records of `target`.
    Reference { target: String, href: String },
}

pub type WidgetBuilder = fn(&FieldDescriptor) -> Widget;

fn text(_: &FieldDescriptor) -> Widget {
    Widget::Text
}

fn textarea(_: &FieldDescriptor) -> Widget {
    Widget::TextArea
}

fn email(_: &FieldDescriptor) -> Widget {
    Widget::Email
}

fn number(_: &FieldDescriptor) -> Widget {
    Widget::Number
}

fn checkbox(_: &FieldDescriptor) -> Widget {
    Widget::Checkbox
}

fn date(_: &FieldDescriptor) -> Widget {
    Widget::Date
}

fn select(f: &FieldDescriptor) -> Widget {
    Widget::Select {
        options: f.enum_values.clone(),
    }
}

fn json(_: &FieldDescriptor) -> Widget {
    Widget::Json
}

fn hidden(_: &FieldDescriptor) -> Widget {
    Widget::Hidden
}

const BY_KIND: &[(FieldKind, WidgetBuilder)] = &[
    (FieldKind::String, text),
    (FieldKind::Number, number),
    (FieldKind::Boolean, checkbox),
    (FieldKind::Date, date),
    (FieldKind::Enum, select),
    (FieldKind::Json, json),
];

const BY_NAME: &[(&str, WidgetBuilder)] = &[
    ("text", text),
    ("textarea", textarea),
    ("email", email),
    ("number", number),
    ("checkbox", checkbox),
    ("date", date),
    ("select", select),
    ("json", json),
    ("hidden", hidden),
];

pub fn is_known_widget(name: &str) -> bool {
    BY_NAME.iter().any(|(n, _)| *n == name)
}

/// Widget for `field`: the named override if any, else the kind's default.
pub fn widget_for(field: &FieldDescriptor, override_name: Option<&str>) -> Widget {
    let named = override_name.and_then(|name| BY_NAME.iter().find(|(n, _)| *n == name));
    if let Some((_, build)) = named {
        return build(field);
    }
    BY_KIND
        .iter()
        .find(|(kind, _)| *kind == field.kind)
        .map(|(_, build)| build(field))
        .unwrap_or(Widget::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor {
            name: "f".into(),
            kind,
            nullable: false,
            default: None,
            generated: false,
            enum_values: vec!["draft".into(), "live".into()],
            auto_update: false,
            db_type: None,
        }
    }

    #[test]
    fn every_kind_has_a_default_widget() {
        assert_eq!(widget_for(&field(FieldKind::String), None), Widget::Text);
        assert_eq!(widget_for(&field(FieldKind::Number), None), Widget::Number);
        assert_eq!(widget_for(&field(FieldKind::Boolean), None), Widget::Checkbox);
        assert_eq!(widget_for(&field(FieldKind::Date), None), Widget::Date);
        assert_eq!(widget_for(&field(FieldKind::Json), None), Widget::Json);
        assert_eq!(
            widget_for(&field(FieldKind::Enum), None),
            Widget::Select {
                options: vec!["draft".into(), "live".into()]
            }
        );
    }

    #[test]
    fn override_wins_over_kind() {
        assert_eq!(widget_for(&field(FieldKind::String), Some("textarea")), Widget::TextArea);
        assert!(is_known_widget("email"));
        assert!(!is_known_widget("rich-text"));
    }
}
