//! Sex / age / family-involvement extraction.
//!
//! Japanese notes state these inline (「78歳 女性」). Obstetric vocabulary
//! (妊娠, 産褥, 授乳…) implies a female patient even without an explicit
//! 女性, and is checked after the male pattern so it wins on conflict.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Demographics, Sex};
use crate::text::normalize::nfkc;

// 男/女 are common inside compound words (長男, 彼女), so the standalone
// forms must not be preceded by another Japanese character.
static MALE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^ぁ-んァ-ン一-龥])男性?(?:$|[^ぁ-んァ-ン一-龥])|♂").expect("male pattern")
});
static FEMALE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^ぁ-んァ-ン一-龥])女性?(?:$|[^ぁ-んァ-ン一-龥])|♀|妊娠|産褥|授乳|母乳")
        .expect("female pattern")
});
static AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*歳").expect("age pattern"));
static FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"家族|妻|夫|母|父|娘|息子|介護者|保護者|親|配偶者").expect("family pattern")
});

pub fn parse(text: &str) -> Demographics {
    let t = nfkc(text);

    let mut sex = Sex::Unknown;
    if MALE.is_match(&t) {
        sex = Sex::Male;
    }
    if FEMALE.is_match(&t) {
        sex = Sex::Female;
    }

    let age = AGE
        .captures(&t)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    Demographics {
        sex,
        age,
        has_family_involvement: FAMILY.is_match(&t),
    }
}
