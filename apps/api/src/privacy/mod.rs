//! Scrubs contact and identity data from résumé text before it
//! reaches the LLM or the UI.
//!
//! Pattern families run in a fixed order over the same string; each one sees the
//! output of the previous family. Placeholders contain no ASCII digits, so a
//! redacted token can never satisfy a later numeric pattern.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

pub const PHONE_PLACEHOLDER: &str = "[手机号已隐藏]";
pub const ID_PLACEHOLDER: &str = "[身份证号已隐藏]";
pub const BANK_CARD_PLACEHOLDER: &str = "[银行卡号已隐藏]";
pub const ADDRESS_PLACEHOLDER: &str = "[详细地址已隐藏]";
pub const SOCIAL_PLACEHOLDER: &str = "[社交账号已隐藏]";

/// Which categories of sensitive data were present in the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveInfo {
    pub has_phone: bool,
    pub has_email: bool,
    pub has_address: bool,
    pub has_id_number: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub filtered_text: String,
    /// Distinct field labels, in the order the families fired.
    pub removed_fields: Vec<&'static str>,
    pub sensitive_info: SensitiveInfo,
}

struct PatternFamily {
    label: &'static str,
    regex: Regex,
    /// Reject matches that touch another ASCII digit (they belong to a longer number).
    digit_bounded: bool,
    render: fn(&Captures) -> String,
}

// Emails run first so numeric mailboxes (13800138000@qq.com) are labelled as email.
// ID numbers run before bank cards: both are long digit runs, IDs carry a date shape.
static FAMILIES: Lazy<Vec<PatternFamily>> = Lazy::new(|| {
    vec![
        PatternFamily {
            label: "email",
            regex: Regex::new(r"[A-Za-z0-9._%+\-]+@([A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,})")
                .unwrap(),
            digit_bounded: false,
            render: |caps| format!("[邮箱@{}]", &caps[1]),
        },
        PatternFamily {
            label: "idNumber",
            regex: Regex::new(
                r"[1-9][0-9]{5}(?:19|20)[0-9]{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12][0-9]|3[01])[0-9]{3}[0-9Xx]",
            )
            .unwrap(),
            digit_bounded: true,
            render: |_| ID_PLACEHOLDER.to_string(),
        },
        PatternFamily {
            label: "bankCard",
            regex: Regex::new(r"[0-9]{4}(?:[ \-][0-9]{4}){3}(?:[ \-]?[0-9]{1,3})?|[1-9][0-9]{15,18}")
                .unwrap(),
            digit_bounded: true,
            render: |_| BANK_CARD_PLACEHOLDER.to_string(),
        },
        // Mobiles are redacted even inside a longer digit run: no 11-digit
        // mobile may survive. Landlines stay digit-bounded.
        PatternFamily {
            label: "phone",
            regex: Regex::new(r"(?:\+?86[ \-]?)?1[3-9][0-9](?:[ \-]?[0-9]{4}){2}").unwrap(),
            digit_bounded: false,
            render: |_| PHONE_PLACEHOLDER.to_string(),
        },
        PatternFamily {
            label: "phone",
            regex: Regex::new(r"0[0-9]{2,3}-[0-9]{7,8}").unwrap(),
            digit_bounded: true,
            render: |_| PHONE_PLACEHOLDER.to_string(),
        },
        // With a label, any street-level tail is an address.
        PatternFamily {
            label: "address",
            regex: Regex::new(
                r"((?:地址|住址|家庭住址|现居住地|居住地|现居)[:：\s]*)(\p{Han}{2,3}?(?:省|市|自治区))(\p{Han}{0,20}?(?:路|街|巷|大道|胡同|村)[0-9A-Za-z\-]*(?:号|弄)?(?:[0-9A-Za-z\-]+(?:栋|楼|单元|室))*)",
            )
            .unwrap(),
            digit_bounded: false,
            render: |caps| format!("{}{}{ADDRESS_PLACEHOLDER}", &caps[1], &caps[2]),
        },
        // Without one, only a street followed by a house number.
        PatternFamily {
            label: "address",
            regex: Regex::new(
                r"(\p{Han}{2,3}?(?:省|市|自治区))(\p{Han}{0,20}?(?:路|街|巷|大道|胡同|村)[0-9]+[A-Za-z\-]*(?:号|弄|室)(?:[0-9A-Za-z\-]+(?:栋|楼|单元|室))*)",
            )
            .unwrap(),
            digit_bounded: false,
            render: |caps| format!("{}{ADDRESS_PLACEHOLDER}", &caps[1]),
        },
        PatternFamily {
            label: "social",
            regex: Regex::new(r"(?i)(微信号?|wechat|vx|qq|微博|github)[ \t]*[:：][ \t]*[A-Za-z0-9_\-.]{4,}")
                .unwrap(),
            digit_bounded: false,
            render: |caps| format!("{}：{SOCIAL_PLACEHOLDER}", &caps[1]),
        },
    ]
});

/// Redacts sensitive data. Pure; never fails.
pub fn filter(text: &str) -> FilterOutcome {
    let mut current = text.to_string();
    let mut removed_fields: Vec<&'static str> = Vec::new();

    for family in FAMILIES.iter() {
        let (next, hit) = replace_matches(&current, family);
        if hit && !removed_fields.contains(&family.label) {
            removed_fields.push(family.label);
        }
        current = next;
    }

    let sensitive_info = SensitiveInfo {
        has_phone: removed_fields.contains(&"phone"),
        has_email: removed_fields.contains(&"email"),
        has_address: removed_fields.contains(&"address"),
        has_id_number: removed_fields.contains(&"idNumber"),
    };

    FilterOutcome {
        filtered_text: current,
        removed_fields,
        sensitive_info,
    }
}

fn replace_matches(text: &str, family: &PatternFamily) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut hit = false;

    for caps in family.regex.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if family.digit_bounded && touches_digit(text, m.start(), m.end()) {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&(family.render)(&caps));
        last = m.end();
        hit = true;
    }
    out.push_str(&text[last..]);
    (out, hit)
}

fn touches_digit(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    static MOBILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"1[3-9][0-9]{9}").unwrap());

    #[test]
    fn test_mobile_number_is_replaced() {
        let out = filter("联系电话13800138000");
        assert_eq!(out.filtered_text, "联系电话[手机号已隐藏]");
        assert_eq!(out.removed_fields, vec!["phone"]);
        assert!(out.sensitive_info.has_phone);
        assert!(!out.sensitive_info.has_email);
    }

    #[test]
    fn test_mobile_variants_leave_no_eleven_digit_run() {
        let inputs = [
            "电话：+86 138-0013-8000，随时联系",
            "Tel 15912345678 / 18600001111",
            "手机 139 1234 5678",
            "联系电话138001380001",
        ];
        for input in inputs {
            let out = filter(input);
            let compact: String = out.filtered_text.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
            assert!(!MOBILE.is_match(&compact), "leaked phone in {:?}", out.filtered_text);
            assert!(out.removed_fields.contains(&"phone"));
        }
    }

    #[test]
    fn test_landline_is_replaced() {
        let out = filter("座机 010-62345678");
        assert_eq!(out.filtered_text, "座机 [手机号已隐藏]");
    }

    #[test]
    fn test_email_keeps_domain_only() {
        let out = filter("邮箱zhangsan@example.com");
        assert!(out.filtered_text.contains("[邮箱@example.com]"));
        assert!(!out.filtered_text.contains("zhangsan"));
        assert_eq!(out.removed_fields, vec!["email"]);
        assert!(out.sensitive_info.has_email);
    }

    #[test]
    fn test_numeric_mailbox_is_email_not_phone() {
        let out = filter("13800138000@qq.com");
        assert_eq!(out.filtered_text, "[邮箱@qq.com]");
        assert_eq!(out.removed_fields, vec!["email"]);
    }

    #[test]
    fn test_id_number_is_replaced() {
        let out = filter("身份证：11010519491231002X");
        assert_eq!(out.filtered_text, "身份证：[身份证号已隐藏]");
        assert!(out.sensitive_info.has_id_number);
        assert_eq!(out.removed_fields, vec!["idNumber"]);
    }

    #[test]
    fn test_bank_card_is_replaced() {
        let out = filter("工资卡 6222 0212 3456 7890 123");
        assert!(out.filtered_text.contains(BANK_CARD_PLACEHOLDER));
        assert_eq!(out.removed_fields, vec!["bankCard"]);

        let out = filter("卡号6222021234567890123");
        assert_eq!(out.filtered_text, "卡号[银行卡号已隐藏]");
    }

    #[test]
    fn test_address_keeps_city_token() {
        let out = filter("地址：北京市朝阳区建国路88号，邮编100000");
        assert!(out.filtered_text.starts_with("地址：北京市[详细地址已隐藏]"));
        assert!(!out.filtered_text.contains("建国路"));
        assert!(out.sensitive_info.has_address);
    }

    #[test]
    fn test_unlabelled_address_needs_house_number() {
        let out = filter("现住上海市徐汇区漕溪北路100号3栋");
        assert_eq!(out.filtered_text, "现住上海市[详细地址已隐藏]");
        assert!(out.sensitive_info.has_address);
    }

    #[test]
    fn test_ordinary_prose_is_not_an_address() {
        for text in [
            "负责市场推广思路的制定",
            "有效节省服务器成本的路由方案",
            "熟悉城市交通系统设计思路",
        ] {
            let out = filter(text);
            assert_eq!(out.filtered_text, text);
            assert!(out.removed_fields.is_empty());
        }
    }

    #[test]
    fn test_social_handles_are_replaced() {
        let out = filter("微信: zhang_san_2020  GitHub：zhangsan-dev");
        assert!(!out.filtered_text.contains("zhang_san_2020"));
        assert!(!out.filtered_text.contains("zhangsan-dev"));
        assert_eq!(out.removed_fields, vec!["social"]);
    }

    #[test]
    fn test_removed_fields_are_deduplicated_in_family_order() {
        let out = filter("电话13800138000 邮箱a@b.com 备用电话13900139000");
        assert_eq!(out.removed_fields, vec!["email", "phone"]);
    }

    #[test]
    fn test_years_and_short_numbers_survive() {
        let text = "2019年-2023年 负责3个项目，团队规模12人，QPS 20000";
        let out = filter(text);
        assert_eq!(out.filtered_text, text);
        assert!(out.removed_fields.is_empty());
    }

    #[test]
    fn test_placeholders_contain_no_digits() {
        for p in [
            PHONE_PLACEHOLDER,
            ID_PLACEHOLDER,
            BANK_CARD_PLACEHOLDER,
            ADDRESS_PLACEHOLDER,
            SOCIAL_PLACEHOLDER,
        ] {
            assert!(!p.chars().any(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_filter_is_idempotent() {
        let once = filter("手机13800138000，邮箱li@corp.cn，地址：上海市徐汇区漕溪北路100号");
        let twice = filter(&once.filtered_text);
        assert_eq!(once.filtered_text, twice.filtered_text);
    }
}
