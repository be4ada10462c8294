//! User-facing message catalog (English and Simplified Chinese).
//!
//! An [`I18n`] value is built once at startup and handed to whatever emits
//! text for the user. Lookups never fail: a key missing from the catalog is
//! returned as-is.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locale {
    En,
    ZhCn,
}

impl Locale {
    /// Resolve the `ui_language` setting. `auto` follows the environment
    /// locale (`LC_ALL`, `LC_MESSAGES`, `LANG`): anything starting with `zh`
    /// selects Chinese, everything else English.
    pub fn resolve(setting: &str, env_lang: Option<&str>) -> Locale {
        match setting {
            "auto" | "" => match env_lang {
                Some(lang) if lang.to_lowercase().starts_with("zh") => Locale::ZhCn,
                _ => Locale::En,
            },
            s if s.eq_ignore_ascii_case("zh_cn") || s.eq_ignore_ascii_case("zh-cn") => Locale::ZhCn,
            _ => Locale::En,
        }
    }
}

/// Environment locale as reported by the usual POSIX variables.
pub fn env_language() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

pub const NO_MESSAGES: &str = "exportNoMessages";
pub const EXPORT_OK: &str = "exportSuccess";
pub const EXPORT_OK_WITH_WARNINGS: &str = "exportSuccessWithWarnings";
pub const EXPORT_FAILED: &str = "exportFailed";
pub const IMAGE_CORS_WARNING: &str = "imageCorsWarning";
pub const PERMISSION_DENIED: &str = "permissionDenied";
pub const UNSUPPORTED_PAGE: &str = "unsupportedPage";

const EN: &[(&str, &str)] = &[
    (NO_MESSAGES, "No chat messages found"),
    (EXPORT_OK, "Exported to $1"),
    (EXPORT_OK_WITH_WARNINGS, "Exported to $1 with $2 warning(s)"),
    (EXPORT_FAILED, "Export failed: $1"),
    (
        IMAGE_CORS_WARNING,
        "Image could not be downloaded (network or cross-origin restriction)",
    ),
    (PERMISSION_DENIED, "No write permission for the export folder: $1"),
    (UNSUPPORTED_PAGE, "Not a supported chat page: $1"),
];

const ZH_CN: &[(&str, &str)] = &[
    (NO_MESSAGES, "未找到聊天消息"),
    (EXPORT_OK, "已导出到 $1"),
    (EXPORT_OK_WITH_WARNINGS, "已导出到 $1（$2 条警告）"),
    (EXPORT_FAILED, "导出失败：$1"),
    (IMAGE_CORS_WARNING, "图片无法下载（网络或跨域限制）"),
    (PERMISSION_DENIED, "没有导出文件夹的写入权限：$1"),
    (UNSUPPORTED_PAGE, "不支持的聊天页面：$1"),
];

#[derive(Clone, Copy, Debug)]
pub struct I18n {
    locale: Locale,
}

impl I18n {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Look up `key` and replace `$1`, `$2`, ... with `subs` in order.
    pub fn t(&self, key: &str, subs: &[&str]) -> String {
        let catalog = match self.locale {
            Locale::En => EN,
            Locale::ZhCn => ZH_CN,
        };
        let Some((_, text)) = catalog.iter().find(|(k, _)| *k == key) else {
            return key.to_string();
        };
        subs.iter()
            .enumerate()
            .fold(text.to_string(), |acc, (i, value)| {
                acc.replace(&format!("${}", i + 1), value)
            })
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(Locale::En)
    }
}
