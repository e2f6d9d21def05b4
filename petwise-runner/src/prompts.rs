//! Prompt text for the chat turn.

use petwise_core::{PetProfile, UserContext};

/// Streamed whenever the model cannot be reached.
pub const SENTINEL_REPLY: &str =
    "Sorry, I'm having trouble processing your request right now. Please try again in a moment.";

/// Direct reply when product search is saturated.
pub const BUSY_REPLY: &str =
    "We're helping a lot of shoppers right now, so I couldn't run that search. Please try again in a few seconds.";

pub const BASE_INSTRUCTIONS: &str = "You are Petwise, a friendly and knowledgeable shopping assistant for an online pet supply store. \
Help customers find the right products for their pets and answer pet-care questions.

Tools:
- Call search_products for any request to find, recommend, compare or buy products. Keep `query` short \
(for example 'puppy food' or 'dog bed'). Put ingredients the pet must avoid in excluded_ingredients, \
ingredients the customer asks for in required_ingredients, and set category_level_1 / category_level_2 \
whenever the animal or department is clear. \"No grain\" means grain-free: do not list grains as excluded ingredients.
- Call search_articles for advice, training, health, behaviour and new-pet questions that are not a shopping request.
- Answer greetings and small talk directly without tools.

When recommending products, rely only on the products you are given. Mention product names exactly as written, \
explain briefly why each fits, and never invent prices, ratings or ingredients. Never mention or link to other retailers. \
Keep answers concise and warm.";

pub const BUTTON_ADDENDUM: &str = "After your answer, suggest up to three short follow-up requests the customer might tap next. \
Put them on the final line, each wrapped in angle brackets, for example:
<Show grain-free options> <Compare the top two> <Treats for training>
Each suggestion is 5 to 50 characters and must not be a URL.";

pub const EVIDENCE_PREAMBLE: &str = "Search results for the customer's request are below, best first. \
Recommend from these products only and refer to them by title.";

pub const NOTHING_MATCHED: &str = "The product search found nothing that matches every filter. \
Tell the customer nothing matched and suggest loosening a filter, such as an ingredient exclusion or the category.";

pub const TOOL_FAILED: &str = "The product search is unavailable right now, so no products could be found. \
Apologize briefly, say no products can be shown at the moment, and invite the customer to try again shortly.";

pub const ARTICLES_FOUND: &str = "Use the articles returned by search_articles to answer. \
Cite each article you use as a markdown link in the form [title](url).";

/// The customer-context block, or `None` when there is nothing to say.
pub fn customer_context(user: Option<&UserContext>, pets: &[PetProfile]) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(user) = user {
        if let Some(name) = user.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            lines.push(format!("Name: {}", name.trim()));
        }
        if let Some(persona) = user.persona_summary.as_deref().filter(|p| !p.trim().is_empty()) {
            lines.push(format!("Persona: {}", persona.trim()));
        }
        let lists = [
            ("Preferred brands", &user.preferred_brands),
            ("Dietary preferences", &user.dietary_preferences),
            ("Allergies", &user.allergies),
            ("Possible next buys", &user.possible_next_buys),
        ];
        for (label, values) in lists {
            if !values.is_empty() {
                lines.push(format!("{label}: {}", values.join(", ")));
            }
        }
    }

    if !pets.is_empty() {
        lines.push("Pets:".to_string());
        lines.extend(pets.iter().map(|pet| format!("- {}", describe_pet(pet))));
    }

    if lines.is_empty() {
        return None;
    }
    Some(format!("Customer context:\n{}", lines.join("\n")))
}

fn describe_pet(pet: &PetProfile) -> String {
    let mut parts = vec![pet.name.clone()];
    let attributes = [
        pet.species.clone(),
        pet.breed.clone(),
        pet.life_stage.clone(),
        pet.effective_size().map(|s| format!("{s} size")),
        pet.weight_lbs.map(|w| format!("{w} lbs")),
    ];
    parts.extend(attributes.into_iter().flatten().filter(|a| !a.trim().is_empty()));
    if !pet.allergies.is_empty() {
        parts.push(format!("allergic to {}", pet.allergies.join(", ")));
    }
    parts.join(", ")
}

/// Base instructions, button addendum and optional customer context.
pub fn system_prompt(user: Option<&UserContext>, pets: &[PetProfile]) -> String {
    let mut prompt = format!("{BASE_INSTRUCTIONS}\n\n{BUTTON_ADDENDUM}");
    if let Some(context) = customer_context(user, pets) {
        prompt.push_str("\n\n");
        prompt.push_str(&context);
    }
    prompt
}
