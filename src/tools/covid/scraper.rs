use crate::error::{Error, Result};
use crate::utils::http::fetch_text;
use regex::Regex;
use tracing::{info, warn};

/// Where the case count sits inside a matched sentence
#[derive(Debug, Clone, Copy)]
enum Token {
    Index(usize),
    Last,
}

const NI_CONFIRMED: (&str, Token) = ("^As of .*", Token::Last);

// The IE page words its update differently from day to day, so several
// phrasings are tried and the largest figure wins.
const IE_CONFIRMED: [(&str, Token); 4] = [
    ("There have been .* deaths associated", Token::Index(13)),
    ("There are now .* cases of", Token::Index(3)),
    ("total number of cases in Ireland is", Token::Last),
    ("This brings the total number of", Token::Last),
];

const IE_DEAD: (&str, Token) = ("There have been .* deaths associated", Token::Index(3));

/// Figures scraped on one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CovidUpdate {
    pub ni_confirmed: i64,
    pub ie_confirmed: i64,
    pub ie_dead: Option<i64>,
}

pub struct Scraper {
    client: reqwest::Client,
    ni_url: String,
    ie_url: String,
}

impl Scraper {
    pub fn new(client: reqwest::Client, ni_url: &str, ie_url: &str) -> Self {
        Self {
            client,
            ni_url: ni_url.to_string(),
            ie_url: ie_url.to_string(),
        }
    }

    /// Fetch both pages concurrently and extract the figures
    pub async fn fetch_updates(&self) -> Result<CovidUpdate> {
        info!(action = "fetch", component = "covid_scraper", "Fetching update pages");
        let (ni_page, ie_page) = futures::try_join!(
            fetch_text(&self.client, &self.ni_url),
            fetch_text(&self.client, &self.ie_url)
        )?;

        let ni_confirmed = extract_ni_confirmed(&ni_page)?;
        let (ie_confirmed, ie_dead) = extract_ie_figures(&ie_page)?;

        info!(
            action = "scraped",
            component = "covid_scraper",
            ni_confirmed,
            ie_confirmed,
            ie_dead = ?ie_dead,
            "Extracted figures"
        );
        Ok(CovidUpdate {
            ni_confirmed,
            ie_confirmed,
            ie_dead,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Malformed {
        what: format!("pattern '{}'", pattern),
        reason: e.to_string(),
    })
}

/// Split an HTML document into trimmed, non-empty text nodes
pub fn text_nodes(html: &str) -> Result<Vec<String>> {
    let hidden = compile(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->")?;
    // Quoted attribute values may contain '>'
    let tag = compile(r#"<(?:"[^"]*"|'[^']*'|[^'">])*>"#)?;
    let entity = compile(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);")?;

    let visible = hidden.replace_all(html, "");
    Ok(tag
        .split(&visible)
        .map(|text| decode_entities(&entity, text).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect())
}

fn decode_entities(entity: &Regex, text: &str) -> String {
    entity
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "nbsp" => Some(' '),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "rsquo" | "lsquo" => Some('\''),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| name.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(|code| code.ok())
                    .and_then(char::from_u32)
                    .map(|c| if c == '\u{a0}' { ' ' } else { c }),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// First text node the pattern matches
pub fn find_text<'a>(nodes: &'a [String], pattern: &Regex) -> Option<&'a str> {
    nodes
        .iter()
        .map(String::as_str)
        .find(|node| pattern.is_match(node))
}

/// Parse a count token such as `1,234.` into a number
pub fn parse_count(token: &str) -> Option<i64> {
    let number = token.split('.').next()?;
    let digits: String = number.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

fn extract(nodes: &[String], (pattern, token): (&str, Token)) -> Result<i64> {
    let regex = compile(pattern)?;
    let sentence = find_text(nodes, &regex)
        .ok_or_else(|| Error::NotFound(format!("no text matching '{}'", pattern)))?;

    let words: Vec<&str> = sentence.split_whitespace().collect();
    let word = match token {
        Token::Index(i) => words.get(i),
        Token::Last => words.last(),
    };

    word.and_then(|w| parse_count(w)).ok_or_else(|| Error::Malformed {
        what: format!("sentence matching '{}'", pattern),
        reason: format!("no count at {:?} in \"{}\"", token, sentence),
    })
}

pub fn extract_ni_confirmed(html: &str) -> Result<i64> {
    let nodes = text_nodes(html)?;
    extract(&nodes, NI_CONFIRMED)
}

/// Confirmed cases (largest of the phrasings found) and deaths when reported
pub fn extract_ie_figures(html: &str) -> Result<(i64, Option<i64>)> {
    let nodes = text_nodes(html)?;

    let mut confirmed = Vec::new();
    for attempt in IE_CONFIRMED {
        match extract(&nodes, attempt) {
            Ok(count) => confirmed.push(count),
            Err(e) => warn!(
                action = "extract",
                component = "covid_scraper",
                pattern = attempt.0,
                error = %e,
                "Phrasing not usable"
            ),
        }
    }

    let largest = confirmed
        .into_iter()
        .max()
        .ok_or_else(|| Error::NotFound("no confirmed case count on the IE page".into()))?;

    let dead = extract(&nodes, IE_DEAD).ok();
    Ok((largest, dead))
}
