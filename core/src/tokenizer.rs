use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Turns raw text into index terms.
///
/// Indexing and querying must use the same normalizer, otherwise the two
/// vocabularies drift apart without any error.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str) -> Vec<String>;
}

impl<F> Normalizer for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn normalize(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\w+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","ain","all","am","an","and","any","are","aren","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","couldn","d","did","didn","do","does","doesn","doing","don","down","during",
            "each","few","for","from","further",
            "had","hadn","has","hasn","have","haven","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","isn","it","its","itself","just",
            "ll","m","ma","me","mightn","more","most","mustn","my","myself",
            "needn","no","nor","not","now","o","of","off","on","once","only","or","other","our","ours","ourselves","out","over","own",
            "re","s","same","shan","she","should","shouldn","so","some","such",
            "t","than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","ve","very",
            "was","wasn","we","were","weren","what","when","where","which","while","who","whom","why","will","with","won","wouldn",
            "y","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// NFKC normalization, lowercasing, word tokenization, English stopword
/// removal and Snowball stemming.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishNormalizer;

impl Normalizer for EnglishNormalizer {
    fn normalize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        RE.find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|token| !is_stopword(token))
            .map(|token| STEMMER.stem(token).into_owned())
            .collect()
    }
}
