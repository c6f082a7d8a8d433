//! Literal and IRI escaping for generated SPARQL.

use chrono::{DateTime, SecondsFormat, Utc};

/// Prefix declarations shared by every query the service issues.
pub const PREFIXES: &str = "\
PREFIX mu: <http://mu.semte.ch/vocabularies/core/>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX nie: <http://www.semanticdesktop.org/ontologies/2007/01/19/nie#>
PREFIX nfo: <http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#>
PREFIX oslc: <http://open-services.net/ns/core#>
PREFIX dbpedia: <http://dbpedia.org/resource/>
PREFIX muAccount: <http://mu.semte.ch/vocabularies/account/>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
";

/// Long-quoted string literal.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 6);
    out.push_str("\"\"\"");
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push_str("\"\"\"");
    out
}

/// IRI reference in angle brackets.
pub fn escape_uri(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('<');
    for c in value.chars() {
        match c {
            '\\' | '"' | '<' | '>' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('>');
    out
}

/// Typed `xsd:dateTime` literal with millisecond precision.
pub fn escape_datetime(value: &DateTime<Utc>) -> String {
    format!(
        "\"{}\"^^xsd:dateTime",
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}
