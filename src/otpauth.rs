use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

pub const OTPAUTH_PREFIX: &str = "otpauth://";

/// Одна строка результата: ключ, значение и подсказка.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterEntry {
    pub key: String,
    pub value: String,
    pub tooltip: String,
}

impl ParameterEntry {
    fn new(key: &str, value: &str, tooltip: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            tooltip: tooltip.to_string(),
        }
    }
}

/// Известный параметр otpauth с дефолтом и описанием.
pub struct FieldSpec {
    pub key: &'static str,
    pub default: &'static str,
    pub tooltip: &'static str,
}

/// Порядок здесь определяет порядок вывода.
pub static FIELDS: [FieldSpec; 7] = [
    FieldSpec {
        key: "issuer",
        default: "(empty)",
        tooltip: "The name of the provider. Default value: (empty)",
    },
    FieldSpec {
        key: "secret",
        default: "(empty)",
        tooltip: "The shared secret key. Default value: (empty)",
    },
    FieldSpec {
        key: "algorithm",
        default: "SHA1",
        tooltip: "The algorithm used for generating the one-time password. Default value: SHA1",
    },
    FieldSpec {
        key: "digits",
        default: "6",
        tooltip: "The number of digits in the one-time password. Default value: 6",
    },
    FieldSpec {
        key: "counter",
        default: "0",
        tooltip: "The initial counter value for the HOTP algorithm. Default value: 0",
    },
    FieldSpec {
        key: "period",
        default: "30",
        tooltip: "The period of time in seconds for which the one-time password will be valid. Default value: 30",
    },
    FieldSpec {
        key: "image",
        default: "(empty)",
        tooltip: "The URL of an image to be displayed as part of the account information. Default value: (empty)",
    },
];

pub fn field(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.key == key)
}

/// Литеральная проверка префикса, с учётом регистра.
pub fn is_otpauth_uri(text: &str) -> bool {
    text.starts_with(OTPAUTH_PREFIX)
}

/// Разобранный otpauth:// URI. Неизменяемый после создания.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpUri {
    kind: String,
    label: String,
    // ключи уникальны: позиция первого появления, значение последнего
    params: Vec<(String, String)>,
}

impl OtpUri {
    /// `None`, если строка не начинается с `otpauth://`.
    /// Битые части URI превращаются в пустые значения, ошибки нет.
    pub fn parse(candidate: &str) -> Option<Self> {
        if !is_otpauth_uri(candidate) {
            return None;
        }

        // путь берётся из исходной строки: Url схлопывает `.` и `..`
        let (raw_host, raw_path, raw_query) = split_lenient(&candidate[OTPAUTH_PREFIX.len()..]);
        let (kind, raw_query) = match Url::parse(candidate) {
            Ok(url) => (
                url.host_str().unwrap_or("").to_string(),
                url.query().unwrap_or("").to_string(),
            ),
            Err(e) => {
                log::debug!("url parser rejected otpauth URI ({e}), splitting leniently");
                (raw_host.to_string(), raw_query.to_string())
            }
        };

        let path = decode_component(raw_path);
        let label = path.strip_prefix('/').unwrap_or(&path).to_string();

        Some(Self {
            kind,
            label,
            params: parse_query(&raw_query),
        })
    }

    /// Тип из authority (`totp`/`hotp`), как есть, без нормализации.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Значение параметра или его дефолт из таблицы полей.
    pub fn get_or_default(&self, key: &str) -> &str {
        self.get(key)
            .or_else(|| field(key).map(|f| f.default))
            .unwrap_or("")
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn shows(&self, key: &str) -> bool {
        match key {
            "counter" => self.kind == "hotp" || self.get(key).is_some(),
            "period" => self.kind == "totp" || self.get(key).is_some(),
            _ => true,
        }
    }

    /// Полный список строк для показа: type, label, известные поля
    /// (значение или дефолт), затем неизвестные ключи в порядке появления.
    pub fn entries(&self) -> Vec<ParameterEntry> {
        let mut out = Vec::with_capacity(2 + FIELDS.len() + self.params.len());
        out.push(ParameterEntry::new("type", &self.kind, ""));
        out.push(ParameterEntry::new("label", &self.label, ""));

        for spec in FIELDS.iter().filter(|f| self.shows(f.key)) {
            let value = self.get(spec.key).unwrap_or(spec.default);
            out.push(ParameterEntry::new(spec.key, value, spec.tooltip));
        }

        for (key, value) in self.params() {
            if field(key).is_none() {
                out.push(ParameterEntry::new(key, value, ""));
            }
        }

        out
    }
}

pub fn interpret(candidate: &str) -> Option<Vec<ParameterEntry>> {
    OtpUri::parse(candidate).map(|uri| uri.entries())
}

fn decode_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// `a=1&b=2`; `+` остаётся плюсом, пустые сегменты пропускаются.
fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(k);
        let value = decode_component(v);

        match params.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => params.push((key, value)),
        }
    }

    params
}

/// Ручной разбор `authority/path?query#fragment`. Путь отсюда берётся
/// всегда, host и query только если строку не принял `url::Url`.
fn split_lenient(rest: &str) -> (&str, &str, &str) {
    let rest = rest.split_once('#').map_or(rest, |(head, _)| head);
    let (before_query, query) = rest.split_once('?').unwrap_or((rest, ""));

    let (authority, path) = match before_query.find('/') {
        Some(idx) => before_query.split_at(idx),
        None => (before_query, ""),
    };

    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host.rfind(':') {
        Some(idx) if !host.ends_with(']') => &host[..idx],
        _ => host,
    };

    (host, path, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[ParameterEntry]) -> Vec<(&str, &str)> {
        entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect()
    }

    #[test]
    fn prefix_is_literal_and_case_sensitive() {
        assert!(interpret("OTPAUTH://totp/foo").is_none());
        assert!(interpret("Otpauth://totp/foo").is_none());
        assert!(interpret("").is_none());
        assert!(interpret("http://x").is_none());
        assert!(interpret(" otpauth://totp/foo").is_none());
        assert!(interpret("otpauth://").is_some());
    }

    #[test]
    fn totp_uri_gets_defaults_and_no_counter() {
        let entries =
            interpret("otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP&issuer=Example")
                .unwrap();
        assert_eq!(
            pairs(&entries),
            vec![
                ("type", "totp"),
                ("label", "Example:alice"),
                ("issuer", "Example"),
                ("secret", "JBSWY3DPEHPK3PXP"),
                ("algorithm", "SHA1"),
                ("digits", "6"),
                ("period", "30"),
                ("image", "(empty)"),
            ]
        );
    }

    #[test]
    fn hotp_with_explicit_period_shows_both() {
        let entries = interpret("otpauth://hotp/Example?secret=ABC&period=30").unwrap();
        let p = pairs(&entries);
        assert!(p.contains(&("counter", "0")));
        assert!(p.contains(&("period", "30")));
    }

    #[test]
    fn unknown_type_hides_counter_and_period() {
        let entries = interpret("otpauth://steam/x?secret=A").unwrap();
        assert!(entries.iter().all(|e| e.key != "counter" && e.key != "period"));
        assert_eq!(entries[0].value, "steam");
    }

    #[test]
    fn type_is_not_lowercased() {
        let uri = OtpUri::parse("otpauth://TOTP/x").unwrap();
        assert_eq!(uri.kind(), "TOTP");
        // "TOTP" не равно "totp", period по умолчанию не добавляется
        assert!(uri.entries().iter().all(|e| e.key != "period"));
    }

    #[test]
    fn label_is_percent_decoded() {
        let uri = OtpUri::parse("otpauth://totp/ACME%20Co:john@example.com?secret=A").unwrap();
        assert_eq!(uri.label(), "ACME Co:john@example.com");
    }

    #[test]
    fn dot_segments_stay_in_label() {
        let uri = OtpUri::parse("otpauth://totp/a/../b?secret=X").unwrap();
        assert_eq!(uri.label(), "a/../b");
        assert_eq!(uri.get("secret"), Some("X"));

        let uri = OtpUri::parse("otpauth://totp/./x").unwrap();
        assert_eq!(uri.label(), "./x");
        assert_eq!(uri.kind(), "totp");
    }

    #[test]
    fn empty_path_gives_empty_label() {
        let uri = OtpUri::parse("otpauth://totp?secret=A").unwrap();
        assert_eq!(uri.label(), "");
        assert_eq!(uri.get("secret"), Some("A"));
    }

    #[test]
    fn duplicate_keys_last_value_first_position() {
        let uri = OtpUri::parse("otpauth://totp/x?foo=1&bar=2&foo=3").unwrap();
        let params: Vec<_> = uri.params().collect();
        assert_eq!(params, vec![("foo", "3"), ("bar", "2")]);
    }

    #[test]
    fn plus_is_not_a_space() {
        let uri = OtpUri::parse("otpauth://totp/x?issuer=A+B").unwrap();
        assert_eq!(uri.get("issuer"), Some("A+B"));
    }

    #[test]
    fn key_without_value() {
        let uri = OtpUri::parse("otpauth://totp/x?secret&&digits=8").unwrap();
        assert_eq!(uri.get("secret"), Some(""));
        assert_eq!(uri.get("digits"), Some("8"));
    }

    #[test]
    fn malformed_uri_falls_back_to_lenient_split() {
        // из-за кривого порта url::Url строку не принимает
        let uri = OtpUri::parse("otpauth://totp:abc/Label?secret=XYZ").unwrap();
        assert_eq!(uri.kind(), "totp");
        assert_eq!(uri.label(), "Label");
        assert_eq!(uri.get("secret"), Some("XYZ"));
    }

    #[test]
    fn bad_percent_encoding_is_not_fatal() {
        let uri = OtpUri::parse("otpauth://totp/a%zzb?secret=%G1").unwrap();
        assert_eq!(uri.label(), "a%zzb");
        assert_eq!(uri.get("secret"), Some("%G1"));
    }

    #[test]
    fn get_or_default_uses_field_table() {
        let uri = OtpUri::parse("otpauth://totp/x?digits=8").unwrap();
        assert_eq!(uri.get_or_default("digits"), "8");
        assert_eq!(uri.get_or_default("algorithm"), "SHA1");
        assert_eq!(uri.get_or_default("nope"), "");
    }

    #[test]
    fn split_lenient_strips_userinfo_and_fragment() {
        assert_eq!(
            split_lenient("user@hotp:99/lbl?counter=4#frag"),
            ("hotp", "/lbl", "counter=4")
        );
        assert_eq!(split_lenient(""), ("", "", ""));
    }
}
