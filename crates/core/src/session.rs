//! Session Manager (§4.8) — tracks per-session query/view history under
//! `.{tool}/sessions/<id>.json` so a later query in the same session can be
//! biased toward files the agent already touched. Last-writer-wins: every
//! mutating call rewrites the full document, no locking (§4.8, §9).

use crate::config::{now_millis, now_secs, TOOL_DIR};
use crate::types::{BoostCandidate, FileView, QueryRecord, Session, SessionFileState, SessionMeta, SessionStatus};
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const RECENT_VIEW_WINDOW_SECS: i64 = 5 * 60;
const VIEW_COUNT_BOOST_FACTOR: f64 = 10.0;
const RECENT_VIEW_BONUS: f64 = 20.0;
const MAX_BOOST: f64 = 50.0;

fn sessions_dir(root: &Path) -> PathBuf {
    root.join(TOOL_DIR).join("sessions")
}

fn session_path(root: &Path, id: &str) -> PathBuf {
    sessions_dir(root).join(format!("{id}.json"))
}

/// `session-<unix-ms>-<6-char-random>` (§4.8).
pub fn generate_session_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("session-{}-{suffix}", now_millis())
}

fn write_atomic(path: &Path, session: &Session) -> crate::error::Result<()> {
    let dir = path.parent().unwrap();
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!("{}.{}.tmp", path.file_name().unwrap().to_string_lossy(), std::process::id()));
    let bytes = serde_json::to_vec_pretty(session)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn load_raw(root: &Path, id: &str) -> Option<Session> {
    let bytes = std::fs::read(session_path(root, id)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Start a new session, optionally named and seeded with an intent string.
pub fn start(root: &Path, name: Option<String>, intent: Option<String>) -> crate::error::Result<Session> {
    let id = generate_session_id();
    let now = now_secs();
    let session = Session {
        meta: SessionMeta {
            id: id.clone(),
            name: name.unwrap_or_else(|| id.clone()),
            created: now,
            last_active: now,
            query_count: 0,
            intent,
            status: SessionStatus::Active,
        },
        files: HashMap::new(),
        query_history: Vec::new(),
        insights: Vec::new(),
    };
    write_atomic(&session_path(root, &id), &session)?;
    Ok(session)
}

/// Load a session by exact id, or by name falling back to the most recently
/// active session carrying that name (§4.8).
pub fn load(root: &Path, id_or_name: &str) -> crate::error::Result<Session> {
    if let Some(session) = load_raw(root, id_or_name) {
        return Ok(session);
    }
    let mut candidates: Vec<Session> = list_raw(root).into_iter().filter(|s| s.meta.name == id_or_name).collect();
    candidates.sort_by(|a, b| b.meta.last_active.cmp(&a.meta.last_active));
    candidates.into_iter().next().ok_or_else(|| crate::error::MantiError::SessionNotFound(id_or_name.to_string()))
}

/// Append a query to history and bump `last_active`/`query_count`.
pub fn record_query(root: &Path, id: &str, query: &str, files_returned: Vec<String>) -> crate::error::Result<Session> {
    let mut session = load(root, id)?;
    session.query_history.push(QueryRecord { query: query.to_string(), timestamp: now_secs(), files_returned });
    session.meta.query_count += 1;
    session.meta.last_active = now_secs();
    write_atomic(&session_path(root, &session.meta.id), &session)?;
    Ok(session)
}

/// Record that `views` were observed in this session: merges view counts,
/// `lastViewed` timestamps, first-seen relevance scores, and blast radii
/// into the per-file state (§4.8). Relevance score and blast radius are only
/// set the first time a file is seen; later views only bump the count and
/// timestamp.
pub fn record_file_views(root: &Path, id: &str, views: &[FileView]) -> crate::error::Result<Session> {
    let mut session = load(root, id)?;
    let now = now_secs();
    for view in views {
        let state = session.files.entry(view.path.clone()).or_default();
        if state.view_count == 0 {
            state.relevance_score = view.relevance_score;
            state.blast_radius = view.blast_radius;
        }
        state.view_count += 1;
        state.last_viewed = now;
    }
    session.meta.last_active = now;
    write_atomic(&session_path(root, &session.meta.id), &session)?;
    Ok(session)
}

pub fn add_insight(root: &Path, id: &str, insight: String) -> crate::error::Result<Session> {
    let mut session = load(root, id)?;
    session.insights.push(insight);
    session.meta.last_active = now_secs();
    write_atomic(&session_path(root, &session.meta.id), &session)?;
    Ok(session)
}

pub fn end(root: &Path, id: &str) -> crate::error::Result<Session> {
    let mut session = load(root, id)?;
    session.meta.status = SessionStatus::Ended;
    session.meta.last_active = now_secs();
    write_atomic(&session_path(root, &session.meta.id), &session)?;
    Ok(session)
}

pub fn delete(root: &Path, id: &str) -> crate::error::Result<()> {
    let path = session_path(root, id);
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn list_raw(root: &Path) -> Vec<Session> {
    let dir = sessions_dir(root);
    let Ok(entries) = std::fs::read_dir(&dir) else { return Vec::new() };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .filter_map(|e| std::fs::read(e.path()).ok())
        .filter_map(|bytes| serde_json::from_slice::<Session>(&bytes).ok())
        .collect()
}

/// All sessions, most-recently-active first (§4.8).
pub fn list(root: &Path) -> Vec<SessionMeta> {
    let mut sessions = list_raw(root);
    sessions.sort_by(|a, b| b.meta.last_active.cmp(&a.meta.last_active));
    sessions.into_iter().map(|s| s.meta).collect()
}

/// `min(50, 10*viewCount) + (20 if viewed within 5 min)` per file (§4.8).
pub fn boost_candidates(session: &Session) -> Vec<BoostCandidate> {
    let now = now_secs();
    session
        .files
        .iter()
        .filter(|(_, state)| state.view_count > 0)
        .map(|(path, state)| {
            let mut boost = (state.view_count as f64 * VIEW_COUNT_BOOST_FACTOR).min(MAX_BOOST);
            let mut reason = "viewed_in_session".to_string();
            if now.saturating_sub(state.last_viewed) < RECENT_VIEW_WINDOW_SECS {
                boost += RECENT_VIEW_BONUS;
                reason = "recently_viewed_in_session".to_string();
            }
            BoostCandidate { path: path.clone(), boost_factor: boost, reason }
        })
        .collect()
}

/// Convenience map form of [`boost_candidates`] for the scorer (§4.4, §4.8).
pub fn boost_map(session: &Session) -> HashMap<String, f64> {
    boost_candidates(session).into_iter().map(|c| (c.path, c.boost_factor)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionFileState;

    #[test]
    fn start_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let created = start(dir.path(), Some("auth-work".into()), Some("fix login".into())).unwrap();
        let loaded = load(dir.path(), &created.meta.id).unwrap();
        assert_eq!(loaded.meta.id, created.meta.id);
        assert_eq!(loaded.meta.name, "auth-work");

        let by_name = load(dir.path(), "auth-work").unwrap();
        assert_eq!(by_name.meta.id, created.meta.id);
    }

    #[test]
    fn record_query_and_views_update_state() {
        let dir = tempfile::tempdir().unwrap();
        let session = start(dir.path(), None, None).unwrap();
        record_query(dir.path(), &session.meta.id, "login bug", vec!["src/auth/login.ts".into()]).unwrap();
        let views = vec![FileView {
            path: "src/auth/login.ts".to_string(),
            relevance_score: 87.5,
            blast_radius: Some(crate::types::BlastRadiusBucket::Medium),
        }];
        let updated = record_file_views(dir.path(), &session.meta.id, &views).unwrap();
        assert_eq!(updated.meta.query_count, 1);
        let state = updated.files.get("src/auth/login.ts").unwrap();
        assert_eq!(state.view_count, 1);
        assert_eq!(state.relevance_score, 87.5);
        assert_eq!(state.blast_radius, Some(crate::types::BlastRadiusBucket::Medium));

        // A second view shouldn't overwrite the first-seen relevance score.
        let second_views = vec![FileView {
            path: "src/auth/login.ts".to_string(),
            relevance_score: 10.0,
            blast_radius: Some(crate::types::BlastRadiusBucket::Small),
        }];
        let again = record_file_views(dir.path(), &session.meta.id, &second_views).unwrap();
        let state = again.files.get("src/auth/login.ts").unwrap();
        assert_eq!(state.view_count, 2);
        assert_eq!(state.relevance_score, 87.5);
        assert_eq!(state.blast_radius, Some(crate::types::BlastRadiusBucket::Medium));
    }

    #[test]
    fn boost_formula_caps_at_fifty() {
        let mut session = Session {
            meta: SessionMeta {
                id: "s".into(),
                name: "s".into(),
                created: 0,
                last_active: 0,
                query_count: 0,
                intent: None,
                status: SessionStatus::Active,
            },
            files: HashMap::new(),
            query_history: Vec::new(),
            insights: Vec::new(),
        };
        session.files.insert(
            "a.ts".into(),
            SessionFileState { view_count: 10, last_viewed: now_secs() - 1000, relevance_score: 0.0, blast_radius: None, notes: Vec::new() },
        );
        let boosts = boost_candidates(&session);
        assert_eq!(boosts[0].boost_factor, MAX_BOOST);
    }

    #[test]
    fn list_orders_by_last_active_desc() {
        let dir = tempfile::tempdir().unwrap();
        let first = start(dir.path(), Some("first".into()), None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = start(dir.path(), Some("second".into()), None).unwrap();
        record_query(dir.path(), &second.meta.id, "q", Vec::new()).unwrap();

        let listed = list(dir.path());
        assert_eq!(listed[0].id, second.meta.id);
        assert_eq!(listed[1].id, first.meta.id);
    }
}
