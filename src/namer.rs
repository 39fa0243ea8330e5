//! Display names for routes.
//!
//! The feed publishes line names in upper case ("19TH AVENUE"). Plain title
//! casing treats a digit as a word break and yields "19Th Avenue", so letters
//! that follow a digit are lowered again afterwards.

/// Convert a raw published line name into its display form.
pub fn display_name(raw: &str) -> String {
    fix_ordinals(&title_case(raw))
}

/// Titlecase the first cased letter of every word and lowercase the rest.
/// Any character that is not cased starts a new word.
fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_cased = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        let cased = is_cased(c);
        if cased && prev_cased {
            // Word-final capital sigma lowers to the final form
            if c == 'Σ' && !chars.peek().is_some_and(|&next| is_cased(next)) {
                out.push('ς');
            } else {
                out.extend(c.to_lowercase());
            }
        } else if cased {
            push_titlecase(c, &mut out);
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }

    out
}

fn is_cased(c: char) -> bool {
    c.is_uppercase() || c.is_lowercase() || is_titlecase_letter(c)
}

/// Letters whose general category is Lt (neither upper nor lower case).
fn is_titlecase_letter(c: char) -> bool {
    matches!(
        c,
        '\u{01C5}'
            | '\u{01C8}'
            | '\u{01CB}'
            | '\u{01F2}'
            | '\u{1F88}'..='\u{1F8F}'
            | '\u{1F98}'..='\u{1F9F}'
            | '\u{1FA8}'..='\u{1FAF}'
            | '\u{1FBC}'
            | '\u{1FCC}'
            | '\u{1FFC}'
    )
}

/// Push the titlecase form of `c`.
///
/// Where titlecase differs from uppercase it is mapped explicitly: the Latin
/// digraphs (`ǆ` -> `ǅ`) and the Greek letters with ypogegrammeni
/// (`ᾳ` -> `ᾼ`). Other multi-character uppercase expansions keep their first
/// cased character and lower the rest (`ß` -> `Ss`, `ﬁ` -> `Fi`). The Greek
/// letters that combine ypogegrammeni with an accent (`ᾲ`, `ᾴ`, `ᾷ` and
/// their eta and omega counterparts) still come out fully uppercased.
fn push_titlecase(c: char, out: &mut String) {
    let mapped = match c {
        '\u{01C4}'..='\u{01C6}' => Some('\u{01C5}'),
        '\u{01C7}'..='\u{01C9}' => Some('\u{01C8}'),
        '\u{01CA}'..='\u{01CC}' => Some('\u{01CB}'),
        '\u{01F1}'..='\u{01F3}' => Some('\u{01F2}'),
        '\u{1F80}'..='\u{1F87}' | '\u{1F90}'..='\u{1F97}' | '\u{1FA0}'..='\u{1FA7}' => {
            char::from_u32(c as u32 + 8)
        }
        '\u{1FB3}' => Some('\u{1FBC}'),
        '\u{1FC3}' => Some('\u{1FCC}'),
        '\u{1FF3}' => Some('\u{1FFC}'),
        c if is_titlecase_letter(c) => Some(c),
        _ => None,
    };
    if let Some(title) = mapped {
        out.push(title);
        return;
    }

    let mut seen_cased = false;
    for upper in c.to_uppercase() {
        if seen_cased {
            out.extend(upper.to_lowercase());
        } else {
            out.push(upper);
            seen_cased = is_cased(upper);
        }
    }
}

/// Lowercase any ASCII capital directly after an ASCII digit ("19Th" -> "19th").
fn fix_ordinals(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_digit = false;

    for c in name.chars() {
        if prev_digit && c.is_ascii_uppercase() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        prev_digit = c.is_ascii_digit();
    }

    out
}
