use std::env;

use log::info;
use wordgen_core::{Alphabet, GenerateOptions, ModelError, ProbabilityTree, ProbabilityTrie, WeightedEndFactor};

const SAMPLE: &[&str] = &[
    "Amsterdam Berlin Copenhagen Dublin Edinburgh Florence Geneva Hamburg",
    "Innsbruck Jerusalem Kingston Lisbon Madrid Nottingham Oslo Prague",
    "Quebec Rotterdam Stockholm Toronto Utrecht Valencia Warsaw York Zurich",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Usage: wordgen-exemple [corpus.txt] [language] [levels]
    let args: Vec<String> = env::args().skip(1).collect();
    let alphabet: Alphabet = args.get(1).map(String::as_str).unwrap_or("enEN").parse()?;
    let levels: usize = match args.get(2) {
        Some(levels) => levels.parse()?,
        None => 3,
    };

    // Train from a corpus file (the model is cached next to it as .json)
    // or from the built-in sample of city names
    let tree = match args.first() {
        Some(corpus) => ProbabilityTree::from_corpus(corpus, alphabet, levels, false)?,
        None => train_sample(alphabet, levels)?,
    };

    // Persisted models behave exactly like freshly trained ones
    let path = env::temp_dir().join("wordgen-exemple.json");
    tree.save(&path)?;
    let tree = ProbabilityTree::load(&path)?;

    // Words between 4 and 10 characters with the default end factor
    let options = GenerateOptions::new(4, 10)?;
    for i in 0..10 {
        println!("Generated word {}: {}", i + 1, tree.generate_word(&options)?);
    }

    // A lower weight lets words stop earlier
    let short = GenerateOptions::new(3, 8)?.with_end_factor(WeightedEndFactor::new(0.4));
    for i in 0..5 {
        println!("Short word {}: {}", i + 1, tree.generate_word(&short)?);
    }

    // Invalid options are reported, not silently fixed
    match GenerateOptions::new(6, 2) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    Ok(())
}

fn train_sample(alphabet: Alphabet, levels: usize) -> Result<ProbabilityTree, ModelError> {
    let mut trie = ProbabilityTrie::new(alphabet, levels)?;
    let words = trie.parse_text_lines(SAMPLE, true);
    info!("Trained sample model on {words} words");
    Ok(trie.normalize())
}
