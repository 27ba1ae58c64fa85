use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::error::AppError;
use crate::domain::settings::TranslationSettings;
use crate::domain::types::{GlossaryCategory, GlossaryTerm, TextField};

/// プロジェクト名未指定時のスコープ
pub const DEFAULT_PROJECT: &str = "default";

/// SQLiteストレージ（settings + texts + glossary_terms、プロジェクト単位）
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// 新規接続（ファイルパス指定）
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)
            .map_err(|e| AppError::storage(format!("DB接続に失敗: {e}")))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// in-memory DB（テスト用）
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::storage(format!("in-memory DB作成に失敗: {e}")))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// スキーママイグレーション
    fn migrate(&self) -> Result<(), AppError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS settings (
                    project TEXT NOT NULL,
                    key     TEXT NOT NULL,
                    value   TEXT NOT NULL,
                    PRIMARY KEY (project, key)
                );

                CREATE TABLE IF NOT EXISTS texts (
                    project    TEXT NOT NULL,
                    field      TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (project, field)
                );

                CREATE TABLE IF NOT EXISTS glossary_terms (
                    id                 TEXT PRIMARY KEY,
                    project            TEXT NOT NULL,
                    source_term        TEXT NOT NULL,
                    target_translation TEXT NOT NULL,
                    category           TEXT NOT NULL,
                    created_at         TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_glossary_project
                    ON glossary_terms(project);
                ",
            )
            .map_err(|e| AppError::storage(format!("マイグレーション失敗: {e}")))?;
        Ok(())
    }

    // --- Settings ---

    /// 保存済みキーを既定値に上書きして返す
    pub fn get_settings(&self, project: &str) -> Result<TranslationSettings, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings WHERE project = ?1")
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let rows: Vec<(String, String)> = stmt
            .query_map(params![project], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;

        if rows.is_empty() {
            return Ok(TranslationSettings::default());
        }

        let mut json = serde_json::to_value(TranslationSettings::default())
            .map_err(|e| AppError::internal(format!("settings serialize: {e}")))?;
        if let Some(map) = json.as_object_mut() {
            for (key, value) in rows {
                // JSONとして解析可能ならそのまま、そうでなければ文字列として
                let value = serde_json::from_str::<serde_json::Value>(&value)
                    .unwrap_or(serde_json::Value::String(value));
                map.insert(key, value);
            }
        }

        match serde_json::from_value::<TranslationSettings>(json) {
            Ok(settings) => Ok(settings.normalized()),
            Err(e) => {
                log::warn!("保存済み設定を読み込めないため既定値を使用します: {e}");
                Ok(TranslationSettings::default())
            }
        }
    }

    pub fn save_settings(
        &self,
        project: &str,
        settings: &TranslationSettings,
    ) -> Result<(), AppError> {
        let json = serde_json::to_value(settings)
            .map_err(|e| AppError::internal(format!("settings serialize: {e}")))?;

        if let Some(obj) = json.as_object() {
            for (key, value) in obj {
                let value_str = value.to_string();
                self.conn
                    .execute(
                        "INSERT INTO settings (project, key, value) VALUES (?1, ?2, ?3)
                         ON CONFLICT(project, key) DO UPDATE SET value = excluded.value",
                        params![project, key, value_str],
                    )
                    .map_err(|e| AppError::storage(format!("設定保存失敗: {e}")))?;
            }
        }

        Ok(())
    }

    // --- Text fields ---

    pub fn get_text(&self, project: &str, field: TextField) -> Result<Option<String>, AppError> {
        self.conn
            .query_row(
                "SELECT content FROM texts WHERE project = ?1 AND field = ?2",
                params![project, field.key()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::storage(format!("テキスト取得失敗: {e}")))
    }

    pub fn set_text(
        &self,
        project: &str,
        field: TextField,
        content: &str,
        now: &str,
    ) -> Result<(), AppError> {
        self.conn
            .execute(
                "INSERT INTO texts (project, field, content, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(project, field) DO UPDATE SET
                    content = excluded.content,
                    updated_at = excluded.updated_at",
                params![project, field.key(), content, now],
            )
            .map_err(|e| AppError::storage(format!("テキスト保存失敗: {e}")))?;
        Ok(())
    }

    pub fn clear_text(&self, project: &str, field: TextField) -> Result<bool, AppError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM texts WHERE project = ?1 AND field = ?2",
                params![project, field.key()],
            )
            .map_err(|e| AppError::storage(format!("テキスト削除失敗: {e}")))?;
        Ok(affected > 0)
    }

    // --- Glossary ---

    pub fn upsert_glossary_term(
        &self,
        project: &str,
        term: &GlossaryTerm,
        now: &str,
    ) -> Result<String, AppError> {
        let id = term
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        self.conn
            .execute(
                "INSERT INTO glossary_terms (id, project, source_term, target_translation, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    source_term = excluded.source_term,
                    target_translation = excluded.target_translation,
                    category = excluded.category",
                params![
                    id,
                    project,
                    term.source_term.trim(),
                    term.target_translation.trim(),
                    term.category.as_str(),
                    now,
                ],
            )
            .map_err(|e| AppError::storage(format!("用語保存失敗: {e}")))?;

        Ok(id)
    }

    /// 登録順の用語一覧
    pub fn list_glossary(&self, project: &str) -> Result<Vec<GlossaryTerm>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, source_term, target_translation, category
                 FROM glossary_terms
                 WHERE project = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let terms = stmt
            .query_map(params![project], Self::map_term_row)
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
        Ok(terms)
    }

    pub fn delete_glossary_term(&self, project: &str, id: &str) -> Result<bool, AppError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM glossary_terms WHERE project = ?1 AND id = ?2",
                params![project, id],
            )
            .map_err(|e| AppError::storage(format!("用語削除失敗: {e}")))?;
        Ok(affected > 0)
    }

    pub fn clear_glossary(&self, project: &str) -> Result<u32, AppError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM glossary_terms WHERE project = ?1",
                params![project],
            )
            .map_err(|e| AppError::storage(format!("用語集削除失敗: {e}")))?;
        Ok(affected as u32)
    }

    fn map_term_row(row: &rusqlite::Row) -> rusqlite::Result<GlossaryTerm> {
        let category: String = row.get(3)?;
        Ok(GlossaryTerm {
            id: Some(row.get(0)?),
            source_term: row.get(1)?,
            target_translation: row.get(2)?,
            category: GlossaryCategory::parse(&category).unwrap_or(GlossaryCategory::Other),
        })
    }

    // --- Projects ---

    /// データを持つプロジェクト名の一覧
    pub fn list_projects(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT project FROM settings
                 UNION SELECT project FROM texts
                 UNION SELECT project FROM glossary_terms
                 ORDER BY project",
            )
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let projects = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;
        Ok(projects)
    }

    /// プロジェクトの全データを削除し、削除行数を返す
    pub fn delete_project(&self, project: &str) -> Result<u32, AppError> {
        let mut total = 0;
        for table in ["settings", "texts", "glossary_terms"] {
            let affected = self
                .conn
                .execute(
                    &format!("DELETE FROM {table} WHERE project = ?1"),
                    params![project],
                )
                .map_err(|e| AppError::storage(format!("プロジェクト削除失敗: {e}")))?;
            total += affected as u32;
        }
        Ok(total)
    }
}
