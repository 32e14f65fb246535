//! Fixed vocabularies shared by registration, check-in and feedback.

/// Regional branches a volunteer can belong to.
pub const BRANCHES: [&str; 11] = [
    "台北分會",
    "桃園分會",
    "新竹分會",
    "台中分會",
    "雲林分會",
    "嘉義分會",
    "台南分會",
    "高雄分會",
    "台東分會",
    "花蓮分會",
    "宜蘭分會",
];

/// Volunteer working groups.
pub const GROUPS: [&str; 13] = [
    "解說教育組",
    "推廣講師組",
    "親子教育組",
    "兒童教育組",
    "棲地工作組",
    "研究發展組",
    "國際事務組",
    "鄉土關懷組",
    "氣候變遷教育組",
    "綠活圖發展組",
    "特殊教育組",
    "自然中心發展組",
    "悅讀荒野工作組",
];

/// Daily feedback prompts, one picked at random per session.
pub const FEEDBACK_QUESTIONS: [&str; 10] = [
    "今日定觀印象最深刻的是？",
    "今日定觀最有趣的是？",
    "今日定觀影響你最大的是？",
    "今日定觀發現了什麼？",
    "今日定觀的感受是？",
    "今日定觀的驚喜是？",
    "今日定觀有什麼遺憾？",
    "今日定觀有何不同？",
    "你想對召集人說的是？",
    "今日定觀最有話題的是？",
];

/// Name of the site choice that skips the distance gate.
pub const FREE_FORM_SITE: &str = "自由定點";

/// Suffix appended to a typed free-form label in the check-in record.
pub const FREE_FORM_SUFFIX: &str = " (自由定點)";

/// Placeholder for branch/group on auto-created profiles.
pub const UNSET: &str = "未設定";

/// Full name used when auth metadata carries none.
pub const DEFAULT_FULL_NAME: &str = "新夥伴";

/// Whether `branch` is one of [`BRANCHES`].
pub fn is_known_branch(branch: &str) -> bool {
    BRANCHES.contains(&branch)
}

/// Whether `group` is one of [`GROUPS`].
pub fn is_known_group(group: &str) -> bool {
    GROUPS.contains(&group)
}

/// Build the stored location name for a free-form check-in.
pub fn free_form_location(label: &str) -> String {
    format!("{}{}", label.trim(), FREE_FORM_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(BRANCHES.len(), 11);
        assert_eq!(GROUPS.len(), 13);
        assert_eq!(FEEDBACK_QUESTIONS.len(), 10);
    }

    #[test]
    fn test_known_branch_and_group() {
        assert!(is_known_branch("花蓮分會"));
        assert!(!is_known_branch(UNSET));
        assert!(is_known_group("棲地工作組"));
        assert!(!is_known_group("棲地組"));
    }

    #[test]
    fn test_free_form_location() {
        assert_eq!(free_form_location("  大安森林公園 "), "大安森林公園 (自由定點)");
    }
}
