//! Asset reference classification and deterministic object paths.
//!
//! A reference is one of: empty, an external `http(s)` URL, a relocated
//! `store://<path>` reference, or a public URL already served by the owned
//! store.

use crate::catalog::CatalogRecord;

pub const STORE_SCHEME: &str = "store://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Audio,
    Cover,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Audio, AssetKind::Cover];

    pub fn file_stem(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::Cover => "cover",
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio/mpeg",
            AssetKind::Cover => "image/jpeg",
        }
    }

    pub fn reference<'a>(&self, record: &'a CatalogRecord) -> &'a str {
        match self {
            AssetKind::Audio => &record.audio_ref,
            AssetKind::Cover => &record.artwork_ref,
        }
    }

    pub fn set_reference(&self, record: &mut CatalogRecord, reference: String) {
        match self {
            AssetKind::Audio => record.audio_ref = reference,
            AssetKind::Cover => record.artwork_ref = reference,
        }
    }
}

pub fn is_external_url(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn store_reference(path: &str) -> String {
    format!("{}{}", STORE_SCHEME, path)
}

/// Object path of a `store://` reference.
pub fn parse_store_reference(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(STORE_SCHEME)
        .filter(|path| !path.is_empty())
}

/// `tracks/<provider>/<record id>/<audio|cover>.<ext>`
pub fn object_path(record: &CatalogRecord, kind: AssetKind, extension: &str) -> String {
    let provider = match record.provider_prefix() {
        "" => "unknown",
        prefix => prefix,
    };
    format!(
        "tracks/{}/{}/{}.{}",
        provider,
        record.id,
        kind.file_stem(),
        extension
    )
}

/// File extension for a MIME type, falling back to the kind's default.
pub fn extension_for(content_type: &str, kind: AssetKind) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "application/ogg" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mp4" | "audio/aac" | "audio/x-m4a" => "m4a",
        "audio/opus" => "opus",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => match kind {
            AssetKind::Audio => "mp3",
            AssetKind::Cover => "jpg",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record_id;

    #[test]
    fn test_external_url_detection() {
        assert!(is_external_url("https://cdn.example.com/a.mp3"));
        assert!(is_external_url("HTTP://cdn.example.com/a.mp3"));
        assert!(!is_external_url("store://tracks/a/b/audio.mp3"));
        assert!(!is_external_url(""));
        assert!(!is_external_url("ftp://host/file"));
    }

    #[test]
    fn test_store_reference_round_trip() {
        let reference = store_reference("tracks/jamendo/jamendo-1/audio.mp3");
        assert_eq!(reference, "store://tracks/jamendo/jamendo-1/audio.mp3");
        assert_eq!(
            parse_store_reference(&reference),
            Some("tracks/jamendo/jamendo-1/audio.mp3")
        );
        assert_eq!(parse_store_reference("store://"), None);
        assert_eq!(parse_store_reference("https://x"), None);
    }

    #[test]
    fn test_object_path_is_deterministic() {
        let record = CatalogRecord {
            id: record_id("audius", "D7KyD"),
            ..Default::default()
        };
        assert_eq!(
            object_path(&record, AssetKind::Cover, "png"),
            "tracks/audius/audius-D7KyD/cover.png"
        );
        assert_eq!(
            object_path(&record, AssetKind::Audio, "mp3"),
            "tracks/audius/audius-D7KyD/audio.mp3"
        );
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("audio/mpeg", AssetKind::Audio), "mp3");
        assert_eq!(extension_for("image/PNG; charset=binary", AssetKind::Cover), "png");
        assert_eq!(extension_for("application/octet-stream", AssetKind::Audio), "mp3");
        assert_eq!(extension_for("", AssetKind::Cover), "jpg");
    }

    #[test]
    fn test_kind_reference_accessors() {
        let mut record = CatalogRecord::default();
        AssetKind::Audio.set_reference(&mut record, "a".to_string());
        AssetKind::Cover.set_reference(&mut record, "c".to_string());
        assert_eq!(AssetKind::Audio.reference(&record), "a");
        assert_eq!(AssetKind::Cover.reference(&record), "c");
    }
}
