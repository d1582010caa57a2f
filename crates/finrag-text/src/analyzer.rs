use tantivy::tokenizer::{LowerCaser, RegexTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

/// Runs of two or more word characters; `_` counts as a word character.
const TOKEN_PATTERN: &str = r"\w\w+";

/// Terms shorter than this are dropped after analysis.
const MIN_TERM_CHARS: usize = 2;

/// The standard English stop-word list used for the term space.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
	"a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always","am","among","amongst","amoungst","amount","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","around","as","at",
	"back","be","became","because","become","becomes","becoming","been","before","beforehand","behind","being","below","beside","besides","between","beyond","bill","both","bottom","but","by",
	"call","can","cannot","cant","co","con","could","couldnt","cry",
	"de","describe","detail","do","done","down","due","during",
	"each","eg","eight","either","eleven","else","elsewhere","empty","enough","etc","even","ever","every","everyone","everything","everywhere","except",
	"few","fifteen","fifty","fill","find","fire","first","five","for","former","formerly","forty","found","four","from","front","full","further",
	"get","give","go","had","has","hasnt","have","he","hence","her","here","hereafter","hereby","herein","hereupon","hers","herself","him","himself","his","how","however","hundred",
	"i","ie","if","in","inc","indeed","interest","into","is","it","its","itself",
	"keep","last","latter","latterly","least","less","ltd",
	"made","many","may","me","meanwhile","might","mill","mine","more","moreover","most","mostly","move","much","must","my","myself",
	"name","namely","neither","never","nevertheless","next","nine","no","nobody","none","noone","nor","not","nothing","now","nowhere",
	"of","off","often","on","once","one","only","onto","or","other","others","otherwise","our","ours","ourselves","out","over","own",
	"part","per","perhaps","please","put","rather","re",
	"same","see","seem","seemed","seeming","seems","serious","several","she","should","show","side","since","sincere","six","sixty","so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such","system",
	"take","ten","than","that","the","their","them","themselves","then","thence","there","thereafter","thereby","therefore","therein","thereupon","these","they","thick","thin","third","this","those","though","three","through","throughout","thru","thus","to","together","too","top","toward","towards","twelve","twenty","two",
	"un","under","until","up","upon","us","very","via",
	"was","we","well","were","what","whatever","when","whence","whenever","where","whereafter","whereas","whereby","wherein","whereupon","wherever","whether","which","while","whither","who","whoever","whole","whom","whose","why","will","with","within","without","would",
	"yet","you","your","yours","yourself","yourselves",
];

/// Lowercasing, stop-word filtering tokenizer shared by indexing and queries.
#[derive(Clone)]
pub struct TermAnalyzer {
	analyzer: TextAnalyzer,
}

impl Default for TermAnalyzer {
	fn default() -> Self {
		let tokenizer = RegexTokenizer::new(TOKEN_PATTERN).expect("token pattern");
		let analyzer = TextAnalyzer::builder(tokenizer)
			.filter(LowerCaser)
			.filter(StopWordFilter::remove(ENGLISH_STOP_WORDS.iter().map(|s| s.to_string())))
			.build();
		Self { analyzer }
	}
}

impl TermAnalyzer {
	pub fn new() -> Self { Self::default() }

	/// Analyze `text` into terms, in order of appearance, duplicates kept.
	pub fn terms(&self, text: &str) -> Vec<String> {
		// token_stream needs a mutable analyzer; the shared one stays untouched.
		let mut analyzer = self.analyzer.clone();
		let mut stream = analyzer.token_stream(text);
		let mut out = Vec::new();
		while stream.advance() {
			let term = &stream.token().text;
			if term.chars().count() >= MIN_TERM_CHARS { out.push(term.clone()); }
		}
		out
	}
}
