use crate::models::Flashcard;

// Parse a loosely formatted "Term: Definition" reply into flashcards.
// Lines that don't qualify are dropped; an empty result is the caller's problem.
pub fn parse_flashcards(response_text: &str) -> Vec<Flashcard> {
    response_text.split('\n').filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Flashcard> {
    // Only the first colon delimits, so "3:30 PM" survives as a definition
    let (term, definition) = line.split_once(':')?;
    let term = term.trim();
    let definition = definition.trim();

    if term.is_empty() || definition.is_empty() {
        return None;
    }

    Some(Flashcard::new(term, definition))
}

// Fixed instruction sent to the content generator
pub fn build_prompt(topic: &str) -> String {
    format!(
        r#"Generate a list of flashcards for the topic of "{}". Each flashcard should have a term and a concise definition. Format the output as a list of "Term: Definition" pairs, with each pair on a new line. Ensure terms and definitions are distinct and clearly separated by a single colon. Here's an example output:
    Hello: Hola
    Goodbye: Adiós"#,
        topic
    )
}
