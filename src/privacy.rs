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

//! Masking helpers for personal data that ends up in log attributes.
//!
//! Every helper is a no-op unless the corresponding switch is on. The process-wide switches are
//! installed by [`setup::init`](crate::setup::init) from the configuration.

use std::borrow::Cow;
use std::sync::RwLock;

static PRIVACY: RwLock<Privacy> = RwLock::new(Privacy::new());

const MAX_INPUT_LEN: usize = 1000;

/// Privacy switches. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privacy {
    pub mask_email: bool,
    pub mask_phone: bool,
    pub sanitize_input: bool,
}

impl Privacy {
    /// Every switch off.
    pub const fn new() -> Self {
        Self {
            mask_email: false,
            mask_phone: false,
            sanitize_input: false,
        }
    }

    /// Mask the local part of an email address.
    ///
    /// # Examples
    ///
    /// ```
    /// use logsieve::privacy::Privacy;
    ///
    /// let privacy = Privacy {
    ///     mask_email: true,
    ///     ..Privacy::default()
    /// };
    /// assert_eq!(privacy.mask_email("test@example.com"), "te**@example.com");
    /// ```
    pub fn mask_email<'a>(&self, email: &'a str) -> Cow<'a, str> {
        if !self.mask_email || email.is_empty() {
            return Cow::Borrowed(email);
        }

        let mut parts = email.split('@');
        let (Some(user), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Cow::Owned(mask_string(email));
        };

        let len = user.chars().count();
        if len <= 2 {
            return Cow::Borrowed(email);
        }

        let head = prefix(user, 2);
        let stars = if len <= 4 { 2 } else { len - 2 };
        Cow::Owned(format!("{head}{}@{domain}", "*".repeat(stars)))
    }

    /// Mask the middle digits of a phone number.
    pub fn mask_phone<'a>(&self, phone: &'a str) -> Cow<'a, str> {
        if !self.mask_phone || phone.is_empty() {
            return Cow::Borrowed(phone);
        }

        let len = phone.chars().count();
        let masked = if len < 7 {
            match len {
                0..=2 => "*".repeat(len),
                3..=4 => format!("{}{}", prefix(phone, 2), "*".repeat(len - 2)),
                _ => format!("{}***", prefix(phone, 2)),
            }
        } else if len == 11 && !phone.starts_with('+') {
            format!("{}****{}", prefix(phone, 3), skip(phone, 7))
        } else if phone.starts_with('+') && len > 10 {
            format!("{}****{}", prefix(phone, 3), skip(phone, len - 4))
        } else {
            format!(
                "{}{}{}",
                prefix(phone, 2),
                "*".repeat(len - 4),
                skip(phone, len - 2)
            )
        };
        Cow::Owned(masked)
    }

    /// Escape line breaks and tabs, and cap the input length.
    pub fn sanitize_input<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !self.sanitize_input {
            return Cow::Borrowed(input);
        }

        let needs_escape = input.contains(['\n', '\r', '\t']);
        if !needs_escape && input.len() <= MAX_INPUT_LEN {
            return Cow::Borrowed(input);
        }

        let mut escaped = input
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t");
        if escaped.len() > MAX_INPUT_LEN {
            let mut end = MAX_INPUT_LEN;
            while !escaped.is_char_boundary(end) {
                end -= 1;
            }
            escaped.truncate(end);
            escaped.push_str("...(truncated)");
        }
        Cow::Owned(escaped)
    }
}

/// Install the process-wide privacy switches.
pub fn set_privacy(privacy: Privacy) {
    *PRIVACY.write().unwrap_or_else(|e| e.into_inner()) = privacy;
}

/// The process-wide privacy switches.
pub fn privacy() -> Privacy {
    *PRIVACY.read().unwrap_or_else(|e| e.into_inner())
}

/// [`Privacy::mask_email`] with the process-wide switches.
pub fn mask_email(email: &str) -> Cow<'_, str> {
    privacy().mask_email(email)
}

/// [`Privacy::mask_phone`] with the process-wide switches.
pub fn mask_phone(phone: &str) -> Cow<'_, str> {
    privacy().mask_phone(phone)
}

/// [`Privacy::sanitize_input`] with the process-wide switches.
pub fn sanitize_input(input: &str) -> Cow<'_, str> {
    privacy().sanitize_input(input)
}

fn mask_string(s: &str) -> String {
    let len = s.chars().count();
    match len {
        0..=2 => "*".repeat(len),
        3..=4 => format!("{}{}", prefix(s, 1), "*".repeat(len - 1)),
        _ => format!("{}{}{}", prefix(s, 2), "*".repeat(len - 4), skip(s, len - 2)),
    }
}

fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn skip(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}
