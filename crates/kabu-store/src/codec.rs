//! CSV バイト列の文字コード処理。
//!
//! 読み込みは UTF-8 (BOM 許容) を第一候補とし、失敗時に Shift_JIS
//! (CP932)、Latin-1 の順でフォールバックします。書き出しは UTF-8 を
//! 正とし、互換用に CP932 の複製を生成できます。

use encoding_rs::{SHIFT_JIS, WINDOWS_1252};

/// UTF-8 の BOM。
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// フォールバックで試す符号化の名前 (エラー報告用)。
pub const READ_ENCODINGS: [&str; 3] = ["utf-8", "shift_jis", "latin-1"];

/// バイト列をフォールバック付きで文字列に復号します。
///
/// 成功時は復号結果と採用した符号化名を返します。全候補で復号できない
/// 場合は `None` (呼び出し側が `StoreError::Decode` に変換)。
pub fn decode_with_fallback(bytes: &[u8]) -> Option<(String, &'static str)> {
    // UTF-8 (BOM があれば除去)
    let stripped = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(stripped) {
        return Some((text.to_string(), "utf-8"));
    }

    // Shift_JIS / CP932
    let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
    if !had_errors {
        return Some((text.into_owned(), "shift_jis"));
    }

    // Latin-1 (WHATWG windows-1252)
    let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
    if !had_errors {
        return Some((text.into_owned(), "latin-1"));
    }

    None
}

/// 文字列を CP932 バイト列に符号化します。
///
/// CP932 で表現できない文字は数値文字参照に置換されます。置換が発生
/// したかどうかを第 2 要素で返します。
pub fn encode_sjis(text: &str) -> (Vec<u8>, bool) {
    let (bytes, _, had_replacements) = SHIFT_JIS.encode(text);
    (bytes.into_owned(), had_replacements)
}
