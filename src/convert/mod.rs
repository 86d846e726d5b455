// src/convert/mod.rs
//
// The record normalizer: renames columns to their ISAD(G) names, back-fills
// missing titles, repairs date strings (deterministic first, model second,
// today's date last) and writes the converted table as CSV + XLSX.

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{error, info, warn};

use std::path::Path;

use crate::export;
use crate::model::TextCompletion;
use crate::table::Table;

pub mod date;

/// ISAD(G) level assigned to every converted record.
pub const LEVEL_OF_DESCRIPTION: &str = "Documento";

/// Title used when neither the model nor the institution field can help.
pub const UNTITLED_PLACEHOLDER: &str = "Documento sin título";

/// Source column → ISAD(G) column, keyed by lookup key (see [`lookup_key`]).
const COLUMN_MAP: [(&str, &str); 6] = [
    ("signatura", "referenceCode"),
    ("fechacronica", "date"),
    ("institucion", "title"),
    ("categoria", "scopeAndContent"),
    ("pais", "country"),
    ("observaciones", "physicalDescription"),
];

/// Normal form used to match source columns: trimmed, lowercased, internal
/// spaces removed. `"  Fecha cronica "` and `"FechaCronica"` both map to
/// `"fechacronica"`.
fn lookup_key(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "")
}

/// Rename recognized source columns to their ISAD(G) names.
///
/// Unrecognized columns keep their original spelling, which makes the rename
/// idempotent: target names are not source keys. When the target name is
/// already taken by another column the source column keeps its name too.
pub fn normalize_columns(table: &mut Table) {
    for i in 0..table.headers.len() {
        let key = lookup_key(&table.headers[i]);
        let Some((_, target)) = COLUMN_MAP.iter().find(|(source, _)| *source == key) else {
            continue;
        };
        if table.headers.iter().any(|h| h == target) {
            continue;
        }
        table.headers[i] = target.to_string();
    }
}

/// Column lookup for prompt context: prefer the raw source column when it
/// survived renaming (matched by lookup key), else the renamed column.
fn context_column(table: &Table, source_key: &str, renamed: &str) -> Option<usize> {
    table
        .headers
        .iter()
        .position(|h| lookup_key(h) == source_key)
        .or_else(|| table.column_index(renamed))
}

pub struct Converter<M> {
    model: M,
    temperature: f32,
    max_new_tokens: u32,
}

impl<M: TextCompletion> Converter<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            temperature: 0.3,
            max_new_tokens: 150,
        }
    }

    /// Ask the model for an ISO-8601 rendering of `raw`. The trimmed answer
    /// is accepted verbatim iff it starts with `YYYY-MM-DD`; anything else,
    /// including a failed call, is "no answer".
    fn ai_normalize_date(&self, raw: &str) -> Option<String> {
        let prompt = format!(
            "Convierte esta fecha a formato ISO 8601:\n\
             Fecha original: {raw}\n\
             Formato ISO: "
        );
        match self
            .model
            .complete(&prompt, self.temperature, self.max_new_tokens)
        {
            Ok(response) => {
                let response = response.trim().to_string();
                if date::has_iso_prefix(&response) {
                    Some(response)
                } else {
                    warn!(raw, response = %response, "model answer is not an ISO date, discarding");
                    None
                }
            }
            Err(e) => {
                warn!(raw, error = %e, "date normalization call failed");
                None
            }
        }
    }

    /// Repair one date cell. Never fails: deterministic parse, then the
    /// model, then today's date.
    pub fn normalize_date(&self, raw: &str) -> String {
        if let Some(parsed) = date::parse_date(raw) {
            return parsed;
        }
        if let Some(answer) = self.ai_normalize_date(raw) {
            return answer;
        }
        Local::now().format("%Y-%m-%d").to_string()
    }

    /// Produce a title for a row whose title cell is empty. Model answers are
    /// trimmed and stripped of literal quotes; a failed call or an empty
    /// answer falls back to the institution value, then to the placeholder.
    pub fn generate_title(&self, institution: &str, category: &str, country: &str) -> String {
        let fallback = || {
            if institution.trim().is_empty() {
                UNTITLED_PLACEHOLDER.to_string()
            } else {
                institution.to_string()
            }
        };

        let prompt = format!(
            "Genera un título archivístico formal en español usando:\n\
             - Institución: {institution}\n\
             - Categoría: {category}\n\
             - País: {country}\n\
             Título: "
        );
        match self
            .model
            .complete(&prompt, self.temperature, self.max_new_tokens)
        {
            Ok(response) => {
                let title = response.trim().replace('"', "");
                if title.is_empty() {
                    fallback()
                } else {
                    title
                }
            }
            Err(e) => {
                warn!(institution, error = %e, "title generation call failed");
                fallback()
            }
        }
    }

    fn fill_titles(&self, table: &mut Table) {
        let title_col = table.ensure_column("title");
        let institution_col = context_column(table, "institucion", "title");
        let category_col = context_column(table, "categoria", "scopeAndContent");
        let country_col = context_column(table, "pais", "country");

        let mut generated = 0usize;
        for row in 0..table.rows.len() {
            if !table.cell(row, title_col).trim().is_empty() {
                continue;
            }
            let fetch = |col: Option<usize>| {
                col.map(|c| table.cell(row, c).to_string())
                    .unwrap_or_default()
            };
            let title = self.generate_title(
                &fetch(institution_col),
                &fetch(category_col),
                &fetch(country_col),
            );
            table.set_cell(row, title_col, title);
            generated += 1;
        }
        if generated > 0 {
            info!(generated, "back-filled missing titles");
        }
    }

    fn fill_dates(&self, table: &mut Table) -> Result<()> {
        let Some(date_col) = table.column_index("date") else {
            bail!("input has no date column (expected a 'Fecha cronica' header)");
        };
        for row in 0..table.rows.len() {
            let normalized = self.normalize_date(table.cell(row, date_col));
            table.set_cell(row, date_col, normalized);
        }
        Ok(())
    }

    fn run(&self, input: &Path, output_base: &Path) -> Result<usize> {
        let mut table = Table::load_csv(input)?;
        normalize_columns(&mut table);

        // Two full passes, titles before dates.
        self.fill_titles(&mut table);
        self.fill_dates(&mut table)?;

        let level_col = table.ensure_column("levelOfDescription");
        for row in 0..table.rows.len() {
            table.set_cell(row, level_col, LEVEL_OF_DESCRIPTION.to_string());
        }

        export::write_outputs(&table, output_base)
            .with_context(|| format!("writing outputs at {:?}", output_base))?;
        Ok(table.rows.len())
    }

    /// Convert `input` and leave `<output_base>.csv` and `<output_base>.xlsx`
    /// behind. Returns `false` on failure, in which case no output files
    /// remain; per-row repairs never fail, only whole-file problems do.
    pub fn process(&self, input: &Path, output_base: &Path) -> bool {
        match self.run(input, output_base) {
            Ok(records) => {
                info!(records, "processing complete");
                true
            }
            Err(e) => {
                error!("processing failed: {e:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    /// Always answers with the same text.
    struct StaticCompletion(&'static str);

    impl TextCompletion for StaticCompletion {
        fn complete(&self, _: &str, _: f32, _: u32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Unreachable endpoint.
    struct FailingCompletion;

    impl TextCompletion for FailingCompletion {
        fn complete(&self, _: &str, _: f32, _: u32) -> Result<String> {
            Err(anyhow!("endpoint unreachable"))
        }
    }

    fn today() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn renames_recognized_columns_case_and_space_insensitively() {
        let mut t = table(
            &["  Signatura ", "Fecha cronica", "INSTITUCION", "Legajo"],
            &[],
        );
        normalize_columns(&mut t);
        assert_eq!(t.headers, vec!["referenceCode", "date", "title", "Legajo"]);
    }

    #[test]
    fn renaming_twice_is_a_noop() {
        let mut t = table(&["Signatura", "Fecha cronica", "Observaciones"], &[]);
        normalize_columns(&mut t);
        let once = t.headers.clone();
        normalize_columns(&mut t);
        assert_eq!(t.headers, once);
    }

    #[test]
    fn rename_skips_columns_whose_target_already_exists() {
        let mut t = table(&["title", "Institucion"], &[]);
        normalize_columns(&mut t);
        assert_eq!(t.headers, vec!["title", "Institucion"]);
    }

    #[test]
    fn date_falls_back_to_today_when_model_unavailable() {
        let converter = Converter::new(FailingCompletion);
        assert_eq!(converter.normalize_date("sin fecha conocida"), today());
    }

    #[test]
    fn deterministic_date_never_reaches_the_model() {
        // A model that would poison the result if consulted.
        let converter = Converter::new(StaticCompletion("9999-99-99"));
        assert_eq!(converter.normalize_date("2020"), "2020-01-01");
        assert_eq!(converter.normalize_date("2020-mar-14"), "2020-03-14");
    }

    #[test]
    fn model_date_is_accepted_verbatim_when_iso_prefixed() {
        let converter = Converter::new(StaticCompletion("1899-12-31"));
        assert_eq!(converter.normalize_date("fines del siglo XIX"), "1899-12-31");
    }

    #[test]
    fn non_iso_model_date_falls_back_to_today() {
        let converter = Converter::new(StaticCompletion("no lo sé"));
        assert_eq!(converter.normalize_date("fines del siglo XIX"), today());
    }

    #[test]
    fn title_uses_institution_when_model_unavailable() {
        let converter = Converter::new(FailingCompletion);
        assert_eq!(converter.generate_title("Archivo X", "", ""), "Archivo X");
    }

    #[test]
    fn title_placeholder_when_institution_also_empty() {
        let converter = Converter::new(FailingCompletion);
        assert_eq!(converter.generate_title("", "", ""), UNTITLED_PLACEHOLDER);
        assert_eq!(converter.generate_title("  ", "", ""), UNTITLED_PLACEHOLDER);
    }

    #[test]
    fn title_answers_are_stripped_of_quotes() {
        let converter = Converter::new(StaticCompletion("  \"Fondo documental X\" "));
        assert_eq!(converter.generate_title("", "", ""), "Fondo documental X");
    }

    #[test]
    fn empty_title_answer_falls_back() {
        let converter = Converter::new(StaticCompletion("   "));
        assert_eq!(
            converter.generate_title("Archivo X", "", ""),
            "Archivo X"
        );
    }

    fn write_input(content: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn process_succeeds_with_model_down() {
        let input = write_input(
            "Inventario general del fondo\n\
             Signatura,Fecha cronica,Institucion,Categoria,Pais,Observaciones\n\
             A-1,1920,Archivo X,Diplomas,Peru,buen estado\n\
             A-2,,,Cartas,Peru,\n",
        );
        let dir = tempdir().unwrap();
        let base = dir.path().join("salida");

        let converter = Converter::new(FailingCompletion);
        assert!(converter.process(input.path(), &base));

        let csv_path = dir.path().join("salida.csv");
        let xlsx_path = dir.path().join("salida.xlsx");
        assert!(csv_path.exists());
        assert!(xlsx_path.exists());

        let bytes = std::fs::read(&csv_path).unwrap();
        assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");
        let content = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "referenceCode,date,title,scopeAndContent,country,physicalDescription,levelOfDescription"
        );
        assert_eq!(
            lines.next().unwrap(),
            "A-1,1920-01-01,Archivo X,Diplomas,Peru,buen estado,Documento"
        );
        // Second row: empty institution, model down → placeholder + today.
        assert_eq!(
            lines.next().unwrap(),
            format!("A-2,{},{},Cartas,Peru,,Documento", today(), UNTITLED_PLACEHOLDER)
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn process_fills_titles_from_surviving_institution_column() {
        // The input already carries a title column, so Institucion keeps its
        // name and feeds the fallback.
        let input = write_input(
            "banner\n\
             Signatura,Fecha cronica,title,Institucion\n\
             A-1,1920,,Archivo X\n",
        );
        let dir = tempdir().unwrap();
        let base = dir.path().join("out");

        let converter = Converter::new(FailingCompletion);
        assert!(converter.process(input.path(), &base));

        let bytes = std::fs::read(dir.path().join("out.csv")).unwrap();
        let content = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert_eq!(row, "A-1,1920-01-01,Archivo X,Archivo X,Documento");
    }

    #[test]
    fn process_fails_on_empty_input_without_leaving_outputs() {
        let input = write_input("");
        let dir = tempdir().unwrap();
        let base = dir.path().join("out");

        let converter = Converter::new(FailingCompletion);
        assert!(!converter.process(input.path(), &base));
        assert!(!dir.path().join("out.csv").exists());
        assert!(!dir.path().join("out.xlsx").exists());
    }

    #[test]
    fn process_fails_when_date_column_is_missing() {
        let input = write_input(
            "banner\n\
             Signatura,Institucion\n\
             A-1,Archivo X\n",
        );
        let dir = tempdir().unwrap();
        let base = dir.path().join("out");

        let converter = Converter::new(FailingCompletion);
        assert!(!converter.process(input.path(), &base));
        assert!(!dir.path().join("out.csv").exists());
    }

    #[test]
    fn header_only_input_yields_empty_outputs() {
        let input = write_input(
            "banner\n\
             Signatura,Fecha cronica,Institucion\n",
        );
        let dir = tempdir().unwrap();
        let base = dir.path().join("out");

        let converter = Converter::new(FailingCompletion);
        assert!(converter.process(input.path(), &base));
        let bytes = std::fs::read(dir.path().join("out.csv")).unwrap();
        let content = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
