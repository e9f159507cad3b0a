// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keyword, number, URL and IP highlighting for console output.

use std::borrow::Cow;
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

/// The semantic class of a highlighted keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Success,
    Failure,
    Warning,
    Action,
    Subject,
}

const KEYWORDS: &[(&str, Category)] = &[
    ("success", Category::Success),
    ("successfully", Category::Success),
    ("loaded", Category::Success),
    ("completed", Category::Success),
    ("established", Category::Success),
    ("initialized", Category::Success),
    ("enabled", Category::Success),
    ("ok", Category::Success),
    ("finished", Category::Success),
    ("resolved", Category::Success),
    ("found", Category::Success),
    ("true", Category::Success),
    ("connected", Category::Success),
    ("error", Category::Failure),
    ("failed", Category::Failure),
    ("fail", Category::Failure),
    ("invalid", Category::Failure),
    ("unable", Category::Failure),
    ("cannot", Category::Failure),
    ("denied", Category::Failure),
    ("rejected", Category::Failure),
    ("timeout", Category::Failure),
    ("panic", Category::Failure),
    ("false", Category::Failure),
    ("disconnected", Category::Failure),
    ("crashed", Category::Failure),
    ("warn", Category::Warning),
    ("warning", Category::Warning),
    ("deprecated", Category::Warning),
    ("fallback", Category::Warning),
    ("skipping", Category::Warning),
    ("missing", Category::Warning),
    ("empty", Category::Warning),
    ("ignored", Category::Warning),
    ("retrying", Category::Warning),
    ("info", Category::Action),
    ("request", Category::Action),
    ("response", Category::Action),
    ("starting", Category::Action),
    ("stopping", Category::Action),
    ("connecting", Category::Action),
    ("sending", Category::Action),
    ("receiving", Category::Action),
    ("processing", Category::Action),
    ("get", Category::Action),
    ("post", Category::Action),
    ("put", Category::Action),
    ("delete", Category::Action),
    ("patch", Category::Action),
    ("debug", Category::Subject),
    ("parsing", Category::Subject),
    ("generating", Category::Subject),
    ("writing", Category::Subject),
    ("reading", Category::Subject),
    ("database", Category::Subject),
    ("cache", Category::Subject),
    ("router", Category::Subject),
    ("server", Category::Subject),
    ("client", Category::Subject),
    ("user", Category::Subject),
    ("session", Category::Subject),
];

static KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = KEYWORDS
        .iter()
        .map(|(word, _)| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("keyword pattern must compile")
});

static NUMERIC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+(\.\d+)?(ms|s|MB|KB|GB)?\b").expect("numeric pattern must compile")
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("url pattern must compile"));

static IP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("ip pattern must compile")
});

/// Look up the category of a keyword, ignoring ASCII case.
pub fn keyword_category(word: &str) -> Option<Category> {
    KEYWORDS
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(word))
        .map(|(_, category)| *category)
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Keyword(Category),
    Url,
    Ip,
    Number,
}

impl Style {
    fn paint(self, text: &str) -> String {
        match self {
            Style::Keyword(Category::Success) => text.bright_green().to_string(),
            Style::Keyword(Category::Failure) => text.bright_red().to_string(),
            Style::Keyword(Category::Warning) => text.bright_yellow().to_string(),
            Style::Keyword(Category::Action) => text.bright_blue().to_string(),
            Style::Keyword(Category::Subject) => text.bright_magenta().to_string(),
            Style::Url => text.cyan().underline().to_string(),
            Style::Ip => text.yellow().to_string(),
            Style::Number => text.bright_white().bold().to_string(),
        }
    }
}

#[derive(Debug)]
struct Span {
    start: usize,
    end: usize,
    style: Style,
}

#[derive(Debug, Default)]
struct Spans(Vec<Span>);

impl Spans {
    // the first claim of a byte range wins; later overlapping candidates are dropped
    fn claim(&mut self, candidates: impl Iterator<Item = (usize, usize)>, style: Style) {
        for (start, end) in candidates {
            let overlaps = self.0.iter().any(|s| s.start < end && start < s.end);
            if !overlaps {
                self.0.push(Span { start, end, style });
            }
        }
    }
}

/// Decorate keywords, URLs, IPv4 addresses and numbers in `text` with ANSI colors.
///
/// Matches are located on the original text so that color codes never feed back into later
/// passes. Text without any match is returned unchanged and borrowed.
pub fn highlight(text: &str) -> Cow<'_, str> {
    let mut spans = Spans::default();

    for m in KEYWORD_REGEX.find_iter(text) {
        if let Some(category) = keyword_category(m.as_str()) {
            spans.claim(std::iter::once((m.start(), m.end())), Style::Keyword(category));
        }
    }
    spans.claim(URL_REGEX.find_iter(text).map(|m| (m.start(), m.end())), Style::Url);
    spans.claim(IP_REGEX.find_iter(text).map(|m| (m.start(), m.end())), Style::Ip);
    spans.claim(
        NUMERIC_REGEX.find_iter(text).map(|m| (m.start(), m.end())),
        Style::Number,
    );

    let mut spans = spans.0;
    if spans.is_empty() {
        return Cow::Borrowed(text);
    }
    spans.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len() + spans.len() * 12);
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push_str(&span.style.paint(&text[span.start..span.end]));
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    Cow::Owned(out)
}
