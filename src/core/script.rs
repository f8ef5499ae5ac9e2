use regex::RegexBuilder;

/// Replaces the source server name with the destination name wherever it
/// appears quoted: `[name]`, `'name'` or `"name"`. Unquoted occurrences are
/// left alone so that object names merely containing the server name
/// survive. Matching is case-insensitive, like SQL Server identifiers.
pub fn substitute_server_name(text: &str, source: &str, destination: &str) -> String {
    if source.is_empty() || source.eq_ignore_ascii_case(destination) {
        return text.to_string();
    }

    let escaped = regex::escape(source);
    let pattern = format!(r#"\[{e}\]|'{e}'|"{e}""#, e = escaped);
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .expect("escaped server name always forms a valid pattern");

    re.replace_all(text, |caps: &regex::Captures| {
        match caps[0].as_bytes()[0] {
            b'[' => format!("[{}]", destination),
            b'\'' => format!("'{}'", destination),
            _ => format!("\"{}\"", destination),
        }
    })
    .into_owned()
}

/// Quotes an identifier for T-SQL, doubling any closing brackets.
pub fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// First non-blank line of a batch, for progress logging.
pub fn summary_line(sql: &str) -> &str {
    sql.lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or(sql)
        .trim()
}
