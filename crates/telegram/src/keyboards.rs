use serde::Serialize;

use courierbot_core::dialog::{
    Keyboard, ADD_ARTICLE_LABEL, CANCEL_LABEL, CLAIM_LABEL, CONTINUE_LABEL, INFO_LABEL,
    REFUSAL_LABEL,
};
use courierbot_core::domain::ClaimType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

/// Telegram `ReplyKeyboardMarkup` payload for the `reply_markup` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

impl ReplyKeyboardMarkup {
    fn from_rows(rows: &[&[&str]]) -> Self {
        Self {
            keyboard: rows
                .iter()
                .map(|row| {
                    row.iter().map(|label| KeyboardButton { text: (*label).to_owned() }).collect()
                })
                .collect(),
            resize_keyboard: true,
        }
    }
}

pub fn markup_for(keyboard: Keyboard) -> ReplyKeyboardMarkup {
    match keyboard {
        Keyboard::MainMenu => main_menu(),
        Keyboard::CancelOnly => cancel_only(),
        Keyboard::AddMore => add_more(),
        Keyboard::ClaimTypes => claim_types(),
    }
}

pub fn main_menu() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::from_rows(&[&[REFUSAL_LABEL, CLAIM_LABEL], &[INFO_LABEL, CANCEL_LABEL]])
}

pub fn cancel_only() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::from_rows(&[&[CANCEL_LABEL]])
}

pub fn add_more() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::from_rows(&[&[ADD_ARTICLE_LABEL, CONTINUE_LABEL], &[CANCEL_LABEL]])
}

pub fn claim_types() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::from_rows(&[
        &[ClaimType::Undelivered.label(), ClaimType::Defective.label()],
        &[ClaimType::MisPick.label(), CANCEL_LABEL],
    ])
}

#[cfg(test)]
mod tests {
    use courierbot_core::dialog::{classify, DialogInput, Keyboard};
    use courierbot_core::domain::ClaimType;

    use super::{add_more, claim_types, main_menu, markup_for};

    #[test]
    fn every_main_menu_button_classifies_as_a_non_text_input() {
        for row in main_menu().keyboard {
            for button in row {
                assert!(
                    !matches!(classify(&button.text), DialogInput::Text(_)),
                    "menu label {:?} must be reserved",
                    button.text
                );
            }
        }
    }

    #[test]
    fn claim_type_keyboard_offers_every_recognized_label() {
        let labels: Vec<String> =
            claim_types().keyboard.into_iter().flatten().map(|button| button.text).collect();
        for claim_type in ClaimType::ALL {
            assert!(labels.contains(&claim_type.label().to_owned()));
        }
    }

    #[test]
    fn markup_serializes_to_the_telegram_wire_shape() {
        let json = serde_json::to_value(markup_for(Keyboard::AddMore)).expect("serialize");
        assert_eq!(json["resize_keyboard"], true);
        assert_eq!(json["keyboard"][0][0]["text"], "➕ Add article");
        assert_eq!(json, serde_json::to_value(add_more()).expect("serialize"));
    }
}
