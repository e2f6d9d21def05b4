//! Interactive chat loop.

use std::io::Write;

use futures::StreamExt;
use petwise_core::ChatTurn;
use petwise_runner::{Assistant, TurnHandle, TurnRequest};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const HELP: &str = "Type a message, or:
  <n>                 send suggestion n
  /compare [question] compare the products last shown
  /ask <n> <question> ask about product n
  /quit               leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Help,
    Suggestion(usize),
    Compare(String),
    Ask(usize, String),
    Message(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if let Ok(n) = line.parse::<usize>() {
        return Input::Suggestion(n);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "quit" | "exit" => Input::Quit,
        "help" => Input::Help,
        "compare" if rest.is_empty() => Input::Compare("compare these".to_string()),
        "compare" => Input::Compare(rest.to_string()),
        "ask" => match rest.split_once(' ') {
            Some((n, question)) if !question.trim().is_empty() => match n.parse() {
                Ok(n) => Input::Ask(n, question.trim().to_string()),
                Err(_) => Input::Help,
            },
            _ => Input::Help,
        },
        _ => Input::Help,
    }
}

fn print_options(options: &[String]) {
    for (i, option) in options.iter().enumerate() {
        println!("  [{}] {option}", i + 1);
    }
}

pub async fn chat(assistant: &Assistant, user_id: &str) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut products = Vec::new();

    let greeting = assistant.personalized_greeting(user_id).await;
    println!("petwise> {}", greeting.text);
    let mut suggestions = greeting.pet_options;
    print_options(&suggestions);

    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = editor.add_history_entry(line.as_str());

        let text = match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => {
                println!("{HELP}");
                continue;
            }
            Input::Suggestion(n) => match suggestions.get(n.wrapping_sub(1)) {
                Some(choice) => choice.clone(),
                None => line.trim().to_string(),
            },
            Input::Compare(question) => {
                if products.len() < 2 {
                    println!("petwise> Search for products first, then I can compare them.");
                } else {
                    let shown = &products[..products.len().min(3)];
                    println!("petwise> {}", assistant.compare_products(&question, shown, &history).await);
                }
                continue;
            }
            Input::Ask(n, question) => {
                match products.get(n.wrapping_sub(1)) {
                    Some(product) => {
                        println!("petwise> {}", assistant.ask_about_product(&question, product, &history).await)
                    }
                    None => println!("petwise> There is no product {n} in the last results."),
                }
                continue;
            }
            Input::Message(text) => text,
        };

        let request = TurnRequest::new(user_id, text.clone()).with_history(history.clone());
        let TurnHandle { mut stream, products: found, finished, .. } = assistant.handle_turn(request).await;

        print!("petwise> ");
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            print!("{chunk}");
            stdout.flush()?;
        }
        println!();
        drop(stream);

        if !found.is_empty() {
            for (i, card) in found.iter().take(5).enumerate() {
                let price = card.price.map(|p| format!(" ${p:.2}")).unwrap_or_default();
                let brand = card.brand.as_deref().map(|b| format!(" ({b})")).unwrap_or_default();
                println!("  {}. {}{brand}{price}", i + 1, card.name);
            }
            products = found;
        }

        if let Ok(outcome) = finished.await {
            history.push(ChatTurn::user(text));
            history.push(ChatTurn::assistant(outcome.reply.cleaned));
            suggestions = outcome.reply.buttons;
            print_options(&suggestions);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_messages() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("2"), Input::Suggestion(2));
        assert_eq!(parse_input("/compare"), Input::Compare("compare these".into()));
        assert_eq!(parse_input("/compare which is cheaper"), Input::Compare("which is cheaper".into()));
        assert_eq!(parse_input("/ask 1 is it grain free?"), Input::Ask(1, "is it grain free?".into()));
        assert_eq!(parse_input("/ask one thing"), Input::Help);
        assert_eq!(parse_input("puppy food"), Input::Message("puppy food".into()));
    }
}
