use wordgen_core::{Alphabet, ProbabilityTrie, TreeNode};

const GERMAN: &[&str] = &[
	"Über den Wolken muss die Freiheit wohl grenzenlos sein.",
	"Größe, Straße, Mädchen und Brötchen; Käse-Kuchen!",
	"Die Bäckerei öffnet früh am Morgen.",
];

fn assert_normalized(node: &TreeNode, path: &mut String) {
	if !node.entries().is_empty() {
		let sum: f64 = node.entries().iter().map(|entry| entry.probability()).sum();
		assert!((sum - 1.0).abs() < 1e-9, "entries of {path:?} sum to {sum}");
	}
	for p in node.end_probability() {
		assert!((0.0..=1.0).contains(p), "end probability {p} at {path:?}");
	}
	for (entry, child) in node.entries().iter().zip(node.children()) {
		path.push(entry.char());
		assert_normalized(child, path);
		path.pop();
	}
}

#[test]
fn every_node_sums_to_one() {
	for id in ["deDE", "deDE_dashed"] {
		let mut trie = ProbabilityTrie::new(Alphabet::from_id(id).unwrap(), 3).unwrap();
		trie.parse_text_lines(GERMAN, false);
		assert_normalized(trie.normalize().root(), &mut String::new());
	}
}

#[test]
fn training_is_deterministic() {
	let train = || {
		let mut trie = ProbabilityTrie::new(Alphabet::from_id("deDE").unwrap(), 3).unwrap();
		trie.parse_text_lines(GERMAN, false);
		trie
	};
	assert_eq!(train(), train());
	assert_eq!(train().normalize(), train().normalize());
}

#[test]
fn word_order_within_a_line_is_irrelevant() {
	let alphabet = Alphabet::from_id("enEN").unwrap();
	let mut forward = ProbabilityTrie::new(alphabet.clone(), 3).unwrap();
	forward.parse_text_lines(["river stone meadow, hollow"], false);
	let mut shuffled = ProbabilityTrie::new(alphabet, 3).unwrap();
	shuffled.parse_text_lines(["hollow meadow; stone river"], false);
	assert_eq!(forward, shuffled);
}

#[test]
fn dashed_alphabet_keeps_compound_words_together() {
	let mut plain = ProbabilityTrie::new(Alphabet::from_id("deDE").unwrap(), 2).unwrap();
	let mut dashed = ProbabilityTrie::new(Alphabet::from_id("deDE_dashed").unwrap(), 2).unwrap();
	assert_eq!(plain.parse_text_lines(["Käse-Kuchen"], false), 2);
	assert_eq!(dashed.parse_text_lines(["Käse-Kuchen"], false), 1);
}

#[test]
fn capitals_only_learns_proper_nouns() {
	let mut trie = ProbabilityTrie::new(Alphabet::from_id("deDE").unwrap(), 2).unwrap();
	let words = trie.parse_text_lines(GERMAN, true);
	// Über Wolken Freiheit Größe Straße Mädchen Brötchen Käse Kuchen Die Bäckerei Morgen
	assert_eq!(words, 12);

	let w = trie.alphabet().index_of('w').unwrap();
	// counted twice as the window start of "Wolken", lowercase words skipped
	assert_eq!(trie.root().count(w), 2);
}

#[test]
fn empty_corpus_normalizes_to_an_empty_root() {
	let trie = ProbabilityTrie::new(Alphabet::default(), 3).unwrap();
	let tree = trie.normalize();
	assert!(tree.root().entries().is_empty());
	assert_eq!(tree.root().end_probability(), [0.0, 0.0, 0.0]);
}
