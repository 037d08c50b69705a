//! SQLite schema.

pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    runs_per_prompt INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS run_brands (
    run_id TEXT NOT NULL,
    brand TEXT NOT NULL,
    is_primary INTEGER NOT NULL,
    PRIMARY KEY (run_id, brand),
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE TABLE IF NOT EXISTS run_prompts (
    run_id TEXT NOT NULL,
    prompt_index INTEGER NOT NULL,
    prompt_text TEXT NOT NULL,
    PRIMARY KEY (run_id, prompt_index),
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE TABLE IF NOT EXISTS responses (
    id TEXT PRIMARY KEY,
    run_id TEXT,
    prompt TEXT NOT NULL,
    response_text TEXT NOT NULL,
    run_number INTEGER NOT NULL,
    provider TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE TABLE IF NOT EXISTS analysis (
    id TEXT PRIMARY KEY,
    response_id TEXT NOT NULL,
    brand TEXT NOT NULL,
    mentioned INTEGER NOT NULL,
    total_mentions INTEGER NOT NULL,
    first_position INTEGER NOT NULL,
    in_first_paragraph INTEGER NOT NULL,
    score INTEGER NOT NULL,
    FOREIGN KEY (response_id) REFERENCES responses(id)
);

CREATE INDEX IF NOT EXISTS idx_responses_run_id ON responses(run_id);
CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs(created_at);
CREATE INDEX IF NOT EXISTS idx_analysis_response_id ON analysis(response_id);
"#;
