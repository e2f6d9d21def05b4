//! Opening message for a new conversation.

use chrono::{Datelike, NaiveDate};
use petwise_core::{PetProfile, UserContext};
use serde::{Deserialize, Serialize};

pub const SOMEONE_ELSE: &str = "Someone else";
const NEW_PET_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub text: String,
    /// Tap-to-answer choices for "who are we shopping for".
    #[serde(default)]
    pub pet_options: Vec<String>,
}

/// Feb 29 birthdays are celebrated on Feb 28 in other years.
fn is_birthday(birthday: NaiveDate, today: NaiveDate) -> bool {
    if birthday.month() == 2 && birthday.day() == 29 && NaiveDate::from_ymd_opt(today.year(), 2, 29).is_none() {
        return today.month() == 2 && today.day() == 28;
    }
    birthday.month() == today.month() && birthday.day() == today.day()
}

fn is_new(pet: &PetProfile, today: NaiveDate) -> bool {
    pet.added_at.is_some_and(|added| {
        let age = (today - added.date_naive()).num_days();
        (0..=NEW_PET_DAYS).contains(&age)
    })
}

/// Deterministic for a given customer, pet list and date.
pub fn personalized_greeting(user: Option<&UserContext>, pets: &[PetProfile], today: NaiveDate) -> Greeting {
    let name = user
        .and_then(|u| u.display_name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let hello = name.map_or_else(|| "Hi there!".to_string(), |n| format!("Hi {n}!"));
    let pet_names: Vec<String> = pets.iter().map(|p| p.name.clone()).collect();
    let options = |lead: &PetProfile| {
        if pets.len() > 1 {
            let mut options = vec![lead.name.clone()];
            options.extend(pet_names.iter().filter(|n| **n != lead.name).cloned());
            options.push(SOMEONE_ELSE.to_string());
            options
        } else {
            Vec::new()
        }
    };

    if let Some(pet) = pets.iter().find(|p| p.birthday.is_some_and(|b| is_birthday(b, today))) {
        return Greeting {
            text: format!(
                "{hello} Happy birthday to {}! Want to find a special treat or toy to celebrate?",
                pet.name
            ),
            pet_options: options(pet),
        };
    }

    if let Some(pet) = pets.iter().find(|p| is_new(p, today)) {
        return Greeting {
            text: format!(
                "{hello} Welcome to the family, {}! I can help you get set up with food, bedding and everything a new pet needs.",
                pet.name
            ),
            pet_options: options(pet),
        };
    }

    match pets {
        [] => Greeting {
            text: format!("{hello} I'm your pet shopping assistant. What can I help you find today?"),
            pet_options: Vec::new(),
        },
        [pet] => Greeting {
            text: format!("{hello} What can I find for {} today?", pet.name),
            pet_options: Vec::new(),
        },
        _ => {
            let mut pet_options = pet_names;
            pet_options.push(SOMEONE_ELSE.to_string());
            Greeting { text: format!("{hello} Who are we shopping for today?"), pet_options }
        }
    }
}
