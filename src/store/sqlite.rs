//! SQLite-backed store.

use crate::models::{AnalysisRecord, ResponseRecord, Run, RunBrand, RunPrompt};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const RESPONSE_COLUMNS: &str =
    "id, run_id, prompt, response_text, run_number, provider, created_at";

/// Handle to the SQLite database. Cloning shares the same connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

/// Row counts removed by [`Store::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearStats {
    pub runs: usize,
    pub responses: usize,
    pub analysis: usize,
}

impl Store {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        debug!("Opened store at {}", path.display());
        Ok(store)
    }

    /// In-memory database for tests.
    #[cfg(test)]
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(super::schema::DDL)
            .context("Failed to initialize schema")?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Store connection lock poisoned"))
    }

    /// Record a run together with its brands and prompts.
    pub fn insert_run(&self, run: &Run, brands: &[RunBrand], prompts: &[RunPrompt]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (id, runs_per_prompt, created_at) VALUES (?1, ?2, ?3)",
            params![run.id, run.runs_per_prompt, format_time(&run.created_at)],
        )
        .with_context(|| format!("Failed to insert run {}", run.id))?;

        for brand in brands {
            tx.execute(
                "INSERT INTO run_brands (run_id, brand, is_primary) VALUES (?1, ?2, ?3)",
                params![brand.run_id, brand.brand, brand.is_primary],
            )
            .with_context(|| format!("Failed to insert brand {:?}", brand.brand))?;
        }

        for prompt in prompts {
            tx.execute(
                "INSERT INTO run_prompts (run_id, prompt_index, prompt_text) VALUES (?1, ?2, ?3)",
                params![prompt.run_id, prompt.prompt_index, prompt.prompt_text],
            )
            .context("Failed to insert prompt")?;
        }

        tx.commit()?;
        info!(
            "Stored run {} ({} brands, {} prompts)",
            run.id,
            brands.len(),
            prompts.len()
        );
        Ok(())
    }

    /// Record a response and its analysis rows atomically.
    pub fn insert_response(&self, response: &ResponseRecord, analysis: &[AnalysisRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO responses (id, run_id, prompt, response_text, run_number, provider, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                response.id,
                response.run_id,
                response.prompt,
                response.response_text,
                response.run_number,
                response.provider,
                format_time(&response.created_at),
            ],
        )
        .with_context(|| format!("Failed to insert response {}", response.id))?;

        for row in analysis {
            tx.execute(
                "INSERT INTO analysis (id, response_id, brand, mentioned, total_mentions, first_position, in_first_paragraph, score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.response_id,
                    row.brand,
                    row.mentioned,
                    row.total_mentions,
                    row.first_position,
                    row.in_first_paragraph,
                    row.score,
                ],
            )
            .with_context(|| format!("Failed to insert analysis for {:?}", row.brand))?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Most recently created run.
    pub fn latest_run(&self) -> Result<Option<Run>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, runs_per_prompt, created_at FROM runs
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                map_run,
            )
            .optional()?;
        Ok(run)
    }

    /// All runs, oldest first.
    pub fn all_runs(&self) -> Result<Vec<Run>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, runs_per_prompt, created_at FROM runs ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], map_run)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Brands of a run, primary first, then by name.
    pub fn brands_for_run(&self, run_id: &str) -> Result<Vec<RunBrand>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, brand, is_primary FROM run_brands
             WHERE run_id = ?1 ORDER BY is_primary DESC, brand ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(RunBrand {
                run_id: row.get(0)?,
                brand: row.get(1)?,
                is_primary: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Prompts of a run in entry order.
    pub fn prompts_for_run(&self, run_id: &str) -> Result<Vec<RunPrompt>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, prompt_index, prompt_text FROM run_prompts
             WHERE run_id = ?1 ORDER BY prompt_index ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(RunPrompt {
                run_id: row.get(0)?,
                prompt_index: row.get(1)?,
                prompt_text: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Responses of a run, oldest first.
    pub fn responses_for_run(&self, run_id: &str) -> Result<Vec<ResponseRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM responses WHERE run_id = ?1 ORDER BY created_at ASC, rowid ASC",
            RESPONSE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![run_id], map_response)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Responses recorded without a run, oldest first.
    pub fn legacy_responses(&self) -> Result<Vec<ResponseRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM responses WHERE run_id IS NULL ORDER BY created_at ASC, rowid ASC",
            RESPONSE_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_response)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every analysis row in insertion order.
    pub fn all_analysis(&self) -> Result<Vec<AnalysisRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, response_id, brand, mentioned, total_mentions, first_position, in_first_paragraph, score
             FROM analysis ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AnalysisRecord {
                id: row.get(0)?,
                response_id: row.get(1)?,
                brand: row.get(2)?,
                mentioned: row.get(3)?,
                total_mentions: row.get(4)?,
                first_position: row.get(5)?,
                in_first_paragraph: row.get(6)?,
                score: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete every run, response, and analysis row.
    pub fn clear_all(&self) -> Result<ClearStats> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let analysis = tx.execute("DELETE FROM analysis", [])?;
        let responses = tx.execute("DELETE FROM responses", [])?;
        tx.execute("DELETE FROM run_brands", [])?;
        tx.execute("DELETE FROM run_prompts", [])?;
        let runs = tx.execute("DELETE FROM runs", [])?;

        tx.commit().context("Failed to clear store")?;
        Ok(ClearStats {
            runs,
            responses,
            analysis,
        })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_run(row: &Row<'_>) -> rusqlite::Result<Run> {
    Ok(Run {
        id: row.get(0)?,
        runs_per_prompt: row.get(1)?,
        created_at: parse_time(row, 2)?,
    })
}

fn map_response(row: &Row<'_>) -> rusqlite::Result<ResponseRecord> {
    Ok(ResponseRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        prompt: row.get(2)?,
        response_text: row.get(3)?,
        run_number: row.get(4)?,
        provider: row.get(5)?,
        created_at: parse_time(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn run_at(offset_minutes: i64) -> Run {
        let mut run = Run::new(2);
        run.created_at += Duration::minutes(offset_minutes);
        run
    }

    fn brand(run: &Run, name: &str, is_primary: bool) -> RunBrand {
        RunBrand {
            run_id: run.id.clone(),
            brand: name.to_string(),
            is_primary,
        }
    }

    fn analysis_row(response: &ResponseRecord, brand: &str, score: u32) -> AnalysisRecord {
        AnalysisRecord {
            id: uuid::Uuid::new_v4().to_string(),
            response_id: response.id.clone(),
            brand: brand.to_string(),
            mentioned: score > 0,
            total_mentions: 1,
            first_position: 4,
            in_first_paragraph: true,
            score,
        }
    }

    #[test]
    fn test_run_round_trip() {
        let store = Store::memory().unwrap();
        let run = run_at(0);
        let prompts = vec![
            RunPrompt { run_id: run.id.clone(), prompt_index: 1, prompt_text: "second".to_string() },
            RunPrompt { run_id: run.id.clone(), prompt_index: 0, prompt_text: "first".to_string() },
        ];
        store
            .insert_run(&run, &[brand(&run, "Zeta", false), brand(&run, "Acme", true), brand(&run, "Beta", false)], &prompts)
            .unwrap();

        assert_eq!(store.latest_run().unwrap(), Some(run.clone()));

        let brands: Vec<String> = store.brands_for_run(&run.id).unwrap().into_iter().map(|b| b.brand).collect();
        assert_eq!(brands, vec!["Acme", "Beta", "Zeta"]);

        let prompts: Vec<String> = store.prompts_for_run(&run.id).unwrap().into_iter().map(|p| p.prompt_text).collect();
        assert_eq!(prompts, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_brand_in_run_is_rejected() {
        let store = Store::memory().unwrap();
        let run = run_at(0);
        let result = store.insert_run(&run, &[brand(&run, "Acme", true), brand(&run, "Acme", false)], &[]);
        assert!(result.is_err());
        // The transaction rolled back, so the run itself is absent too.
        assert!(store.latest_run().unwrap().is_none());
    }

    #[test]
    fn test_runs_are_chronological() {
        let store = Store::memory().unwrap();
        let later = run_at(5);
        let earlier = run_at(0);
        store.insert_run(&later, &[], &[]).unwrap();
        store.insert_run(&earlier, &[], &[]).unwrap();

        let ids: Vec<String> = store.all_runs().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![earlier.id.clone(), later.id.clone()]);
        assert_eq!(store.latest_run().unwrap().map(|r| r.id), Some(later.id));
    }

    #[test]
    fn test_responses_and_analysis() {
        let store = Store::memory().unwrap();
        let run = run_at(0);
        store.insert_run(&run, &[brand(&run, "Acme", true)], &[]).unwrap();

        let response = ResponseRecord::new(Some(run.id.clone()), "best crm", "Acme wins", 1, "ollama");
        let rows = vec![analysis_row(&response, "Acme", 8)];
        store.insert_response(&response, &rows).unwrap();

        let legacy = ResponseRecord::new(None, "old prompt", "text", 1, "gemini");
        store.insert_response(&legacy, &[]).unwrap();

        assert_eq!(store.responses_for_run(&run.id).unwrap(), vec![response]);
        assert_eq!(store.legacy_responses().unwrap(), vec![legacy]);
        assert_eq!(store.all_analysis().unwrap(), rows);
    }

    #[test]
    fn test_analysis_requires_existing_response() {
        let store = Store::memory().unwrap();
        let response = ResponseRecord::new(None, "p", "t", 1, "test");
        let orphan = ResponseRecord::new(None, "p", "t", 1, "test");
        let result = store.insert_response(&response, &[analysis_row(&orphan, "Acme", 1)]);
        assert!(result.is_err());
        assert!(store.legacy_responses().unwrap().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let store = Store::memory().unwrap();
        let run = run_at(0);
        store
            .insert_run(
                &run,
                &[brand(&run, "Acme", true)],
                &[RunPrompt { run_id: run.id.clone(), prompt_index: 0, prompt_text: "p".to_string() }],
            )
            .unwrap();
        let response = ResponseRecord::new(Some(run.id.clone()), "p", "Acme", 1, "test");
        store
            .insert_response(&response, &[analysis_row(&response, "Acme", 3)])
            .unwrap();

        let stats = store.clear_all().unwrap();
        assert_eq!(stats, ClearStats { runs: 1, responses: 1, analysis: 1 });
        assert!(store.all_runs().unwrap().is_empty());
        assert!(store.all_analysis().unwrap().is_empty());
        assert!(store.brands_for_run(&run.id).unwrap().is_empty());

        assert_eq!(store.clear_all().unwrap(), ClearStats::default());
    }

    #[test]
    fn test_open_file_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brandpulse.db");
        let run = run_at(0);

        {
            let store = Store::open(&path).unwrap();
            store.insert_run(&run, &[brand(&run, "Acme", true)], &[]).unwrap();
        }

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.all_runs().unwrap(), vec![run]);
    }
}
