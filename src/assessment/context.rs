//! Care-setting and topical-category keyword tables.
//!
//! Both the note and each catalogue definition resolve to sets of tags by
//! plain keyword containment on NFKC-folded text. The tables mix Japanese
//! and English clinical shorthand because charts do.

use std::collections::BTreeSet;

use crate::catalog::DiagnosisDefinition;
use crate::text::normalize::nfkc;

/// Care-context tags and the vocabulary implying them.
pub const SETTING_KEYWORDS: &[(&str, &[&str])] = &[
    ("ICU", &["ICU", "HCU", "集中治療", "人工呼吸器", "挿管", "人工呼吸"]),
    ("在宅", &["在宅", "訪問", "家屋", "家族介護"]),
    ("外来", &["外来", "クリニック"]),
    ("精神", &["精神科", "うつ", "不安障害", "幻覚", "妄想", "向精神薬"]),
    ("術後", &["術後", "手術後", "POD", "ドレーン", "創部"]),
    ("リハ", &["リハ", "リハビリ", "PT", "OT", "ST"]),
];

/// Topical categories and the vocabulary implying them.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "呼吸",
        &[
            "呼吸", "気道", "酸素", "SpO2", "喘", "RR", "息切", "酸素化", "airway",
            "breathing", "oxygenation", "COPD", "喘息",
        ],
    ),
    (
        "循環",
        &[
            "循環", "ショック", "血圧", "SBP", "MAP", "脈拍", "HR", "出血", "末梢冷感",
            "circulation",
        ],
    ),
    (
        "排泄",
        &[
            "排尿", "排便", "失禁", "尿閉", "便秘", "下痢", "ストーマ", "カテーテル", "尿量",
        ],
    ),
    (
        "栄養",
        &[
            "栄養", "食事", "食欲", "経口", "嚥下", "摂食", "摂取", "飲水", "脱水", "経管",
            "BMI", "体重",
        ],
    ),
    (
        "活動/ADL",
        &[
            "歩行", "移動", "ADL", "更衣", "起居", "セルフケア", "活動", "耐久", "リハ",
            "PT", "OT", "ST",
        ],
    ),
    (
        "睡眠/休息",
        &["睡眠", "不眠", "入眠", "中途覚醒", "休息", "昼夜逆転"],
    ),
    (
        "安全",
        &[
            "転倒", "転落", "誤嚥", "出血リスク", "皮膚損傷", "褥瘡", "感染予防", "安全",
            "拘束",
        ],
    ),
    ("疼痛", &["痛み", "疼痛", "NRS", "鎮痛"]),
    (
        "皮膚/創傷",
        &[
            "褥瘡", "発赤", "びらん", "皮膚", "スキン", "創部", "創傷", "ドレッシング", "滲出",
        ],
    ),
    (
        "感染",
        &["感染", "発熱", "抗菌薬", "白血球", "CRP", "敗血症"],
    ),
    (
        "精神/情緒",
        &["不安", "うつ", "混乱", "不穏", "幻覚", "妄想", "ストレス", "気分"],
    ),
    (
        "知識/自己管理",
        &[
            "教育", "説明", "理解", "自己管理", "アドヒアランス", "服薬", "指導", "知識不足",
        ],
    ),
    (
        "妊娠/産科",
        &["妊娠", "産褥", "分娩", "胎児", "授乳", "母乳", "産科"],
    ),
    (
        "コミュニケーション",
        &["コミュニケーション", "意思疎通", "聴力", "視力", "言語"],
    ),
    (
        "手術/周術期",
        &["術前", "術後", "手術", "麻酔", "POD", "ドレーン", "創部"],
    ),
];

fn tags_in(text: &str, table: &[(&str, &[&str])]) -> BTreeSet<String> {
    let folded = nfkc(text);
    table
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| folded.contains(kw)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Care-context tags present in the note.
pub fn care_settings_in(text: &str) -> BTreeSet<String> {
    tags_in(text, SETTING_KEYWORDS)
}

/// Topical categories present in the note.
pub fn categories_in(text: &str) -> BTreeSet<String> {
    tags_in(text, CATEGORY_KEYWORDS)
}

/// Topical categories a diagnosis resolves to, from its focus, taxonomy and
/// prose fields.
pub fn categories_of_definition(def: &DiagnosisDefinition) -> BTreeSet<String> {
    let joined = [
        def.primary_focus.as_str(),
        def.secondary_focus.as_str(),
        def.domain.as_str(),
        def.class.as_str(),
        def.label.as_str(),
        def.definition.as_str(),
    ]
    .join(" ");
    categories_in(&joined)
}

/// Care settings a diagnosis implies, from its constraint and taxonomy
/// fields. Used by the setting-mismatch penalty.
pub fn settings_of_definition(def: &DiagnosisDefinition) -> BTreeSet<String> {
    let joined = [
        def.situational_constraints.as_str(),
        def.domain.as_str(),
        def.class.as_str(),
        def.priority_hint.as_str(),
        def.definition.as_str(),
    ]
    .join(" ");
    care_settings_in(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_detected() {
        let s = care_settings_in("ICU入室、人工呼吸器管理中");
        assert!(s.contains("ICU"));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn categories_detected() {
        let c = categories_in("SpO2 88%、呼吸困難。疼痛 NRS 6。");
        assert!(c.contains("呼吸"));
        assert!(c.contains("疼痛"));
    }

    #[test]
    fn no_keywords_no_tags() {
        assert!(care_settings_in("特記事項なし").is_empty());
        assert!(categories_in("特記事項無し").is_empty());
    }

    #[test]
    fn definition_categories_use_focus_fields() {
        let def = DiagnosisDefinition {
            label: "非効果的気道浄化".into(),
            primary_focus: "気道".into(),
            ..Default::default()
        };
        assert!(categories_of_definition(&def).contains("呼吸"));
    }

    #[test]
    fn definition_settings_use_constraints() {
        let def = DiagnosisDefinition {
            situational_constraints: "集中治療下".into(),
            ..Default::default()
        };
        assert!(settings_of_definition(&def).contains("ICU"));
    }
}
