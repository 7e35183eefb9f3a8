//! Project document (de)serialization.
//!
//! The persisted format is a JSON document whose polymorphic collections
//! (tracks, items, clips) carry an explicit `Type` discriminator that is
//! read *before* choosing the concrete shape. Legacy documents encoded the
//! discriminators and the export format as integers; both spellings are
//! accepted on read, strings are written.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OpResult, PersistError, Result};
use crate::model::{
    ClipKind, ItemPayload, ProjectClip, ScriptRenderSettings, SourceLength, TimelineTrack,
    TrackItem, TrackKind, Translation, VerseBlock,
};
use crate::project::{ExportFormat, Project};
use crate::timecode::TimeCode;
use crate::undo::UndoEngine;

/// A discriminator as found in the wild: current string or legacy integer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeTag {
    Text(String),
    Legacy(i64),
}

impl TypeTag {
    fn of(value: &Value, context: &str) -> Result<TypeTag> {
        let raw = value.get("Type").ok_or_else(|| PersistError::ParseFailed {
            reason: format!("{context}: missing Type discriminator"),
        })?;
        serde_json::from_value(raw.clone()).map_err(|_| {
            PersistError::ParseFailed {
                reason: format!("{context}: malformed Type discriminator"),
            }
            .into()
        })
    }

    fn resolve<T: Copy>(&self, table: &[(&str, i64, T)]) -> Result<T> {
        for (name, legacy, value) in table {
            match self {
                TypeTag::Text(s) if s == name => return Ok(*value),
                TypeTag::Legacy(n) if n == legacy => return Ok(*value),
                _ => {}
            }
        }
        let tag = match self {
            TypeTag::Text(s) => s.clone(),
            TypeTag::Legacy(n) => n.to_string(),
        };
        Err(PersistError::UnknownTypeTag { tag }.into())
    }
}

const TRACK_TAGS: &[(&str, i64, TrackKind)] = &[
    ("Script", 0, TrackKind::Script),
    ("Video", 1, TrackKind::Video),
    ("Audio", 2, TrackKind::Audio),
];

const CLIP_TAGS: &[(&str, i64, ClipKind)] = &[
    ("Script", 0, ClipKind::Script),
    ("VideoOrImage", 1, ClipKind::VideoOrImage),
    ("Audio", 2, ClipKind::Audio),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemTag {
    Script,
    Audio,
    Visual,
}

const ITEM_TAGS: &[(&str, i64, ItemTag)] = &[
    ("ScriptItem", 0, ItemTag::Script),
    ("AudioItem", 1, ItemTag::Audio),
    ("VideoOrImageItem", 2, ItemTag::Visual),
];

const FORMAT_TAGS: &[(&str, i64, ExportFormat)] = &[
    ("Mp4", 0, ExportFormat::Mp4),
    ("Mkv", 1, ExportFormat::Mkv),
];

// ==========================================
// FIELD HELPERS
// ==========================================

fn parse_failed(reason: impl Into<String>) -> crate::error::EditorError {
    PersistError::ParseFailed {
        reason: reason.into(),
    }
    .into()
}

fn get_f64(value: &Value, field: &str) -> Result<f64> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| parse_failed(format!("missing numeric field {field}")))
}

fn get_str<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| parse_failed(format!("missing string field {field}")))
}

fn get_bool(value: &Value, field: &str) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn get_uuid(value: &Value, field: &str) -> Result<Uuid> {
    Uuid::parse_str(get_str(value, field)?)
        .map_err(|_| parse_failed(format!("invalid id in field {field}")))
}

// ==========================================
// SERIALIZATION
// ==========================================

fn verse_to_value(verse: &VerseBlock) -> Value {
    json!({
        "Chapter": verse.chapter,
        "Verse": verse.verse,
        "Text": verse.text,
        "Translations": verse.translations.iter().map(|t| json!({
            "Language": t.language,
            "Text": t.text,
        })).collect::<Vec<_>>(),
    })
}

fn item_to_value(item: &TrackItem) -> Value {
    let mut doc = json!({
        "Type": item.kind().name(),
        "Id": item.id.to_string(),
        "ClipId": item.clip_id.to_string(),
        "Position": item.position().total_frames(),
        "Start": item.start().total_frames(),
        "End": item.end().total_frames(),
        "UnlimitedSource": item.is_unlimited(),
        "FadeInFrame": item.fade_in_frames(),
        "FadeOutFrame": item.fade_out_frames(),
    });
    if let SourceLength::Bounded(length) = item.source() {
        doc["SourceLength"] = json!(length.total_frames());
    }
    if let Some(verse) = item.verse() {
        doc["Verse"] = verse_to_value(verse);
    }
    doc
}

fn track_to_value(track: &TimelineTrack) -> Value {
    json!({
        "Type": track.kind.name(),
        "Id": track.id.to_string(),
        "Items": track.items().iter().map(item_to_value).collect::<Vec<_>>(),
    })
}

fn clip_to_value(clip: &ProjectClip) -> Value {
    json!({
        "Type": clip.kind.name(),
        "Id": clip.id.to_string(),
        "Path": clip.path.display().to_string(),
        "Length": clip.length.total_frames(),
        "Fps": clip.fps,
        "Width": clip.width,
        "Height": clip.height,
        "UnlimitedLength": clip.unlimited_length,
    })
}

/// Project → persisted JSON document.
pub fn to_document(project: &Project) -> Result<String> {
    let doc = json!({
        "Id": project.id.to_string(),
        "FrameRate": project.fps,
        "Needle": project.needle().total_frames(),
        "ExportDirectory": project.export_directory.display().to_string(),
        "ExportFormat": project.export_format.name(),
        "RenderSettings": serde_json::to_value(&project.settings)
            .map_err(|e| PersistError::WriteFailed { reason: e.to_string() })?,
        "CreatedAt": project.created_at,
        "ModifiedAt": project.modified_at,
        "Tracks": project.tracks().iter().map(track_to_value).collect::<Vec<_>>(),
        "Clips": project.clips().iter().map(clip_to_value).collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&doc).map_err(|e| {
        PersistError::WriteFailed {
            reason: e.to_string(),
        }
        .into()
    })
}

// ==========================================
// DESERIALIZATION
// ==========================================

fn value_to_verse(value: &Value) -> Result<VerseBlock> {
    let mut verse = VerseBlock::new(
        get_f64(value, "Chapter")? as u32,
        get_f64(value, "Verse")? as u32,
        get_str(value, "Text")?,
    );
    if let Some(translations) = value.get("Translations").and_then(Value::as_array) {
        for t in translations {
            verse
                .translations
                .push(Translation::new(get_str(t, "Language")?, get_str(t, "Text")?));
        }
    }
    Ok(verse)
}

fn value_to_item(value: &Value, fps: f64) -> Result<TrackItem> {
    let tag = TypeTag::of(value, "track item")?.resolve(ITEM_TAGS)?;

    let payload = match tag {
        ItemTag::Script => {
            let verse = value
                .get("Verse")
                .map(value_to_verse)
                .transpose()?
                .unwrap_or_else(|| VerseBlock::new(0, 0, ""));
            ItemPayload::Script { verse }
        }
        ItemTag::Audio => ItemPayload::Audio,
        ItemTag::Visual => ItemPayload::Visual,
    };

    let source = if get_bool(value, "UnlimitedSource") {
        SourceLength::Unlimited
    } else {
        SourceLength::Bounded(TimeCode::new(
            get_f64(value, "SourceLength").unwrap_or(f64::MAX),
            fps,
        ))
    };

    Ok(TrackItem::from_parts(
        get_uuid(value, "Id")?,
        get_uuid(value, "ClipId")?,
        TimeCode::new(get_f64(value, "Position")?, fps),
        TimeCode::new(get_f64(value, "Start")?, fps),
        TimeCode::new(get_f64(value, "End")?, fps),
        source,
        get_f64(value, "FadeInFrame").unwrap_or(0.0),
        get_f64(value, "FadeOutFrame").unwrap_or(0.0),
        payload,
    ))
}

fn value_to_track(value: &Value, fps: f64) -> Result<TimelineTrack> {
    let kind = TypeTag::of(value, "track")?.resolve(TRACK_TAGS)?;
    let mut track = TimelineTrack::new(kind);
    track.id = get_uuid(value, "Id")?;

    if let Some(items) = value.get("Items").and_then(Value::as_array) {
        for item in items {
            track.add_item(value_to_item(item, fps)?)?;
        }
    }
    Ok(track)
}

fn value_to_clip(value: &Value, fps_fallback: f64) -> Result<ProjectClip> {
    let kind = TypeTag::of(value, "clip")?.resolve(CLIP_TAGS)?;
    let fps = get_f64(value, "Fps").unwrap_or(fps_fallback);
    let mut clip = ProjectClip::new(
        get_str(value, "Path")?,
        TimeCode::new(get_f64(value, "Length")?, fps),
        fps,
        get_f64(value, "Width").unwrap_or(0.0) as u32,
        get_f64(value, "Height").unwrap_or(0.0) as u32,
        kind,
        get_bool(value, "UnlimitedLength"),
    );
    clip.id = get_uuid(value, "Id")?;
    Ok(clip)
}

/// Persisted JSON document → Project (fresh undo history, cold caches).
pub fn from_document(document: &str) -> Result<Project> {
    let doc: Value = serde_json::from_str(document).map_err(|e| PersistError::ParseFailed {
        reason: e.to_string(),
    })?;

    let fps = get_f64(&doc, "FrameRate")?;
    let export_format = match doc.get("ExportFormat") {
        Some(raw) => serde_json::from_value::<TypeTag>(raw.clone())
            .map_err(|_| parse_failed("malformed ExportFormat"))?
            .resolve(FORMAT_TAGS)?,
        None => ExportFormat::Mp4,
    };
    let settings = match doc.get("RenderSettings") {
        Some(raw) => serde_json::from_value::<ScriptRenderSettings>(raw.clone())
            .map_err(|e| parse_failed(format!("bad RenderSettings: {e}")))?,
        None => ScriptRenderSettings::default(),
    };

    let tracks = doc
        .get("Tracks")
        .and_then(Value::as_array)
        .map(|tracks| tracks.iter().map(|t| value_to_track(t, fps)).collect())
        .transpose()?
        .unwrap_or_default();
    let clips = doc
        .get("Clips")
        .and_then(Value::as_array)
        .map(|clips| clips.iter().map(|c| value_to_clip(c, fps)).collect())
        .transpose()?
        .unwrap_or_default();

    let now = chrono::Utc::now().to_rfc3339();
    let mut project = Project {
        id: get_uuid(&doc, "Id")?,
        fps,
        tracks,
        clips,
        settings,
        needle: TimeCode::zero(fps),
        export_directory: PathBuf::from(get_str(&doc, "ExportDirectory").unwrap_or(".")),
        export_format,
        created_at: get_str(&doc, "CreatedAt").unwrap_or(&now).to_string(),
        modified_at: get_str(&doc, "ModifiedAt").unwrap_or(&now).to_string(),
        undo: UndoEngine::new(),
    };
    if let Ok(needle) = get_f64(&doc, "Needle") {
        project.set_needle(TimeCode::new(needle, fps));
    }
    Ok(project)
}

// ==========================================
// PUBLIC BOUNDARY
// ==========================================

/// Save a project document. Failures come back as a structured result, not
/// an error; callers show `message` to the user.
pub fn save_project(project: &Project, path: &Path) -> OpResult<PathBuf> {
    let document = match to_document(project) {
        Ok(document) => document,
        Err(e) => return OpResult::fail(format!("Could not serialize project: {e}")),
    };
    match std::fs::write(path, document) {
        Ok(()) => {
            info!("Saved project {} to {}", project.id, path.display());
            OpResult::ok("Project saved", path.to_path_buf())
        }
        Err(e) => OpResult::fail(format!("Could not write {}: {e}", path.display())),
    }
}

/// Open a project document. Same structured-result contract as
/// [`save_project`].
pub fn open_project(path: &Path) -> OpResult<Project> {
    let document = match std::fs::read_to_string(path) {
        Ok(document) => document,
        Err(e) => {
            warn!("Open failed for {}: {}", path.display(), e);
            return OpResult::fail(format!("Could not read {}: {e}", path.display()));
        }
    };
    match from_document(&document) {
        Ok(project) => OpResult::ok("Project opened", project),
        Err(e) => {
            warn!("Parse failed for {}: {}", path.display(), e);
            OpResult::fail(format!("Could not parse {}: {e}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Color;

    const FPS: f64 = 25.0;

    fn tc(frames: f64) -> TimeCode {
        TimeCode::new(frames, FPS)
    }

    fn sample_project() -> Project {
        let mut project = Project::new(FPS);
        project.settings.font_color = Color::argb(255, 250, 240, 230);
        project.export_format = ExportFormat::Mkv;

        let video_track = project.add_track(TrackKind::Video);
        let audio_track = project.add_track(TrackKind::Audio);
        let script_track = project.add_track(TrackKind::Script);

        let video_clip = project.register_clip(ProjectClip::new(
            "/media/intro.mp4",
            tc(2000.0),
            FPS,
            1920,
            1080,
            ClipKind::VideoOrImage,
            false,
        ));
        let audio_clip = project.register_clip(ProjectClip::new(
            "/media/song.wav",
            tc(4000.0),
            FPS,
            0,
            0,
            ClipKind::Audio,
            false,
        ));
        let script_clip = project.register_clip(ProjectClip::new(
            "verses.json",
            tc(0.0),
            FPS,
            0,
            0,
            ClipKind::Script,
            true,
        ));

        let mut visual = TrackItem::visual(
            video_clip,
            tc(100.0),
            tc(200.0),
            tc(800.0),
            SourceLength::Bounded(tc(2000.0)),
        );
        visual.set_fade_in_frames(40.0);
        visual.set_fade_out_frames(50.0);
        project.add_item(video_track, visual).unwrap();

        project
            .add_item(
                audio_track,
                TrackItem::audio(audio_clip, tc(0.0), tc(0.0), tc(900.0), tc(4000.0)),
            )
            .unwrap();

        let verse = VerseBlock::new(3, 16, "For God so loved the world")
            .with_translation(Translation::new("de", "Denn so hat Gott die Welt geliebt"));
        project
            .add_item(
                script_track,
                TrackItem::script(script_clip, tc(0.0), tc(300.0), verse),
            )
            .unwrap();

        project.set_needle(tc(120.0));
        project
    }

    #[test]
    fn document_round_trip_preserves_structure() {
        let project = sample_project();
        let document = to_document(&project).unwrap();
        let restored = from_document(&document).unwrap();

        assert_eq!(restored.id, project.id);
        assert_eq!(restored.fps, FPS);
        assert_eq!(restored.export_format, ExportFormat::Mkv);
        assert_eq!(restored.needle().total_frames(), 120.0);
        assert_eq!(restored.settings.font_color, Color::argb(255, 250, 240, 230));
        assert_eq!(restored.tracks().len(), 3);
        assert_eq!(restored.clips().len(), 3);

        // The visual item survives with geometry and fades intact.
        let video_track = &restored.tracks()[0];
        let item = &video_track.items()[0];
        assert_eq!(item.position().total_frames(), 100.0);
        assert_eq!(item.start().total_frames(), 200.0);
        assert_eq!(item.end().total_frames(), 800.0);
        assert_eq!(item.fade_in_frames(), 40.0);
        assert_eq!(item.fade_out_frames(), 50.0);

        // The verse payload survives with its translation.
        let script_track = &restored.tracks()[2];
        let verse = script_track.items()[0].verse().unwrap();
        assert_eq!(verse.chapter, 3);
        assert_eq!(verse.verse, 16);
        assert_eq!(verse.translations[0].language, "de");
    }

    #[test]
    fn document_uses_type_discriminators_and_color_tuples() {
        let project = sample_project();
        let document = to_document(&project).unwrap();

        assert!(document.contains("\"Type\": \"Video\""));
        assert!(document.contains("\"Type\": \"ScriptItem\""));
        assert!(document.contains("\"Type\": \"VideoOrImageItem\""));
        assert!(document.contains("\"255,250,240,230\""));
    }

    #[test]
    fn legacy_integer_tags_still_deserialize() {
        let id = Uuid::new_v4();
        let clip_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let track_id = Uuid::new_v4();
        let document = format!(
            r#"{{
                "Id": "{id}",
                "FrameRate": 25.0,
                "ExportFormat": 1,
                "Tracks": [{{
                    "Type": 1,
                    "Id": "{track_id}",
                    "Items": [{{
                        "Type": 2,
                        "Id": "{item_id}",
                        "ClipId": "{clip_id}",
                        "Position": 10.0,
                        "Start": 0.0,
                        "End": 50.0,
                        "SourceLength": 100.0,
                        "UnlimitedSource": false,
                        "FadeInFrame": 0.0,
                        "FadeOutFrame": 0.0
                    }}]
                }}],
                "Clips": [{{
                    "Type": 1,
                    "Id": "{clip_id}",
                    "Path": "/media/a.mp4",
                    "Length": 100.0,
                    "Fps": 25.0,
                    "Width": 640,
                    "Height": 360,
                    "UnlimitedLength": false
                }}]
            }}"#
        );

        let project = from_document(&document).unwrap();
        assert_eq!(project.export_format, ExportFormat::Mkv);
        assert_eq!(project.tracks()[0].kind, TrackKind::Video);
        assert_eq!(project.tracks()[0].items()[0].end().total_frames(), 50.0);
        assert_eq!(project.clips()[0].kind, ClipKind::VideoOrImage);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let id = Uuid::new_v4();
        let document = format!(
            r#"{{"Id": "{id}", "FrameRate": 25.0,
                 "Tracks": [{{"Type": "Holographic", "Id": "{id}", "Items": []}}],
                 "Clips": []}}"#
        );
        let err = from_document(&document).unwrap_err();
        assert!(err.to_string().contains("Holographic"));
    }

    #[test]
    fn open_and_save_report_structured_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");

        let project = sample_project();
        let saved = save_project(&project, &path);
        assert!(saved.success);

        let opened = open_project(&path);
        assert!(opened.success);
        assert_eq!(opened.data.unwrap().id, project.id);

        let missing = open_project(&dir.path().join("nope.json"));
        assert!(!missing.success);
        assert!(missing.data.is_none());
        assert!(!missing.message.is_empty());

        std::fs::write(&path, "{ not json").unwrap();
        let broken = open_project(&path);
        assert!(!broken.success);
    }

    #[test]
    fn reopened_project_has_fresh_history() {
        let project = sample_project();
        assert!(project.can_undo());
        let document = to_document(&project).unwrap();
        let mut restored = from_document(&document).unwrap();
        assert!(!restored.can_undo());
        assert!(!restored.undo());
    }
}
