// src/evaluation/export.rs - JSON/CSV/TSV export of analyses and evaluation results, labeled pair import

use chrono::Utc;
use log::{info, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use super::analyzer::AnalysisReport;
use super::evaluator::{compare_results, EvaluationResult, LabeledPair};
use crate::error::EvaluationError;

const TEXT1_COLUMNS: &[&str] = &["text1", "string1", "s1"];
const TEXT2_COLUMNS: &[&str] = &["text2", "string2", "s2"];
const LABEL_COLUMNS: &[&str] = &["is_duplicate", "isduplicate", "duplicate", "label"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Tsv,
}

impl ExportFormat {
    /// Format named by the file extension.
    pub fn from_path(path: &Path) -> Result<Self, EvaluationError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .parse()
    }

    fn delimiter(self) -> u8 {
        match self {
            ExportFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            other => Err(EvaluationError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
        };
        f.write_str(name)
    }
}

fn csv_writer<W: Write>(writer: W, format: ExportFormat) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(writer)
}

fn score(value: f64) -> String {
    format!("{:.4}", value)
}

/// One row per pair. Delimited output gets a column per algorithm seen in any breakdown.
pub fn write_analysis<W: Write>(
    report: &AnalysisReport,
    writer: W,
    format: ExportFormat,
) -> Result<(), EvaluationError> {
    if format == ExportFormat::Json {
        serde_json::to_writer_pretty(writer, report)?;
        return Ok(());
    }

    let algorithms: BTreeSet<&str> = report
        .pairs
        .iter()
        .flat_map(|p| p.breakdown.keys().map(String::as_str))
        .collect();
    let mut out = csv_writer(writer, format);
    let mut header = vec!["text1", "text2", "similarity", "is_duplicate", "confidence"];
    header.extend(algorithms.iter().copied());
    out.write_record(&header)?;

    for pair in &report.pairs {
        let mut row = vec![
            pair.text1.clone(),
            pair.text2.clone(),
            score(pair.similarity),
            pair.is_duplicate.to_string(),
            score(pair.confidence),
        ];
        row.extend(
            algorithms
                .iter()
                .map(|name| pair.breakdown.get(*name).map(|&s| score(s)).unwrap_or_default()),
        );
        out.write_record(&row)?;
    }
    out.flush()?;
    Ok(())
}

/// Ranked by F1, best first.
pub fn write_results<W: Write>(
    results: &[EvaluationResult],
    writer: W,
    format: ExportFormat,
) -> Result<(), EvaluationError> {
    let ranked = compare_results(results.to_vec());
    if format == ExportFormat::Json {
        serde_json::to_writer_pretty(writer, &ranked)?;
        return Ok(());
    }

    let mut out = csv_writer(writer, format);
    out.write_record([
        "name",
        "threshold",
        "precision",
        "recall",
        "f1",
        "f2",
        "accuracy",
        "true_positives",
        "true_negatives",
        "false_positives",
        "false_negatives",
        "pairs_per_second",
    ])?;
    for r in &ranked {
        out.write_record([
            r.name.clone(),
            format!("{:.2}", r.threshold),
            score(r.metrics.precision),
            score(r.metrics.recall),
            score(r.metrics.f1),
            score(r.metrics.f2),
            score(r.metrics.accuracy),
            r.matrix.true_positives.to_string(),
            r.matrix.true_negatives.to_string(),
            r.matrix.false_positives.to_string(),
            r.matrix.false_negatives.to_string(),
            format!("{:.1}", r.items_per_second),
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_training_pairs<W: Write>(
    pairs: &[LabeledPair],
    writer: W,
    format: ExportFormat,
) -> Result<(), EvaluationError> {
    if format == ExportFormat::Json {
        serde_json::to_writer_pretty(writer, pairs)?;
        return Ok(());
    }
    let mut out = csv_writer(writer, format);
    out.write_record(["text1", "text2", "is_duplicate"])?;
    for pair in pairs {
        out.write_record([pair.text1.as_str(), pair.text2.as_str(), if pair.is_duplicate { "true" } else { "false" }])?;
    }
    out.flush()?;
    Ok(())
}

/// Markdown summary of an analysis: statistics, recommendations and a pair table.
pub fn write_report<W: Write>(report: &AnalysisReport, mut writer: W) -> Result<(), EvaluationError> {
    let stats = &report.statistics;
    let share = |count: usize| {
        if stats.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / stats.total as f64
        }
    };
    writeln!(writer, "# Similarity analysis")?;
    writeln!(writer, "Generated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer)?;
    writeln!(writer, "## Statistics")?;
    writeln!(writer)?;
    writeln!(writer, "- Threshold: {:.2}", report.threshold)?;
    writeln!(writer, "- Pairs: {}", stats.total)?;
    writeln!(writer, "- Duplicates: {} ({:.1}%)", stats.duplicates, share(stats.duplicates))?;
    writeln!(writer, "- Distinct: {} ({:.1}%)", stats.non_duplicates, share(stats.non_duplicates))?;
    writeln!(
        writer,
        "- Similarity: average {:.4}, min {:.4}, max {:.4}, median {:.4}",
        stats.average, stats.min, stats.max, stats.median
    )?;
    writeln!(writer)?;
    writeln!(writer, "## Recommendations")?;
    writeln!(writer)?;
    for (i, hint) in report.recommendations.iter().enumerate() {
        writeln!(writer, "{}. {}", i + 1, hint)?;
    }
    writeln!(writer)?;
    writeln!(writer, "## Pairs")?;
    writeln!(writer)?;
    writeln!(writer, "| Text 1 | Text 2 | Similarity | Duplicate | Confidence |")?;
    writeln!(writer, "|--------|--------|------------|-----------|------------|")?;
    for pair in &report.pairs {
        writeln!(
            writer,
            "| {} | {} | {:.4} | {} | {:.4} |",
            pair.text1.replace('|', "\\|"),
            pair.text2.replace('|', "\\|"),
            pair.similarity,
            pair.is_duplicate,
            pair.confidence
        )?;
    }
    Ok(())
}

fn parse_label(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

fn column(headers: &csv::StringRecord, aliases: &[&str], name: &'static str) -> Result<usize, EvaluationError> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.to_lowercase().as_str()))
        .ok_or(EvaluationError::MissingColumn(name))
}

/// Reads labeled pairs. Delimited input needs a header naming the two text columns
/// and the label column in any order; rows that cannot be read are skipped with a warning.
pub fn read_training_pairs<R: Read>(reader: R, format: ExportFormat) -> Result<Vec<LabeledPair>, EvaluationError> {
    if format == ExportFormat::Json {
        return Ok(serde_json::from_reader(reader)?);
    }

    let mut input = csv::ReaderBuilder::new()
        .delimiter(format.delimiter())
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = input.headers()?.clone();
    let text1 = column(&headers, TEXT1_COLUMNS, "text1")?;
    let text2 = column(&headers, TEXT2_COLUMNS, "text2")?;
    let label = column(&headers, LABEL_COLUMNS, "is_duplicate")?;

    let mut pairs = Vec::new();
    for (i, record) in input.records().enumerate() {
        let line = i + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable row {}: {}", line, e);
                continue;
            }
        };
        let (Some(a), Some(b)) = (record.get(text1), record.get(text2)) else {
            warn!("Skipping row {}: only {} fields", line, record.len());
            continue;
        };
        let Some(is_duplicate) = parse_label(record.get(label).unwrap_or_default()) else {
            warn!("Skipping row {}: unrecognized label '{}'", line, record.get(label).unwrap_or_default());
            continue;
        };
        pairs.push(LabeledPair::new(a, b, is_duplicate));
    }
    Ok(pairs)
}

fn create(path: &Path) -> Result<BufWriter<File>, EvaluationError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| EvaluationError::file(path, e))
}

pub fn export_analysis(report: &AnalysisReport, path: &Path) -> Result<(), EvaluationError> {
    let format = ExportFormat::from_path(path)?;
    let mut writer = create(path)?;
    write_analysis(report, &mut writer, format)?;
    writer.flush()?;
    info!("💾 Analysis of {} pairs written to {}", report.pairs.len(), path.display());
    Ok(())
}

pub fn export_results(results: &[EvaluationResult], path: &Path) -> Result<(), EvaluationError> {
    let format = ExportFormat::from_path(path)?;
    let mut writer = create(path)?;
    write_results(results, &mut writer, format)?;
    writer.flush()?;
    info!("💾 {} evaluation results written to {}", results.len(), path.display());
    Ok(())
}

pub fn export_training_pairs(pairs: &[LabeledPair], path: &Path) -> Result<(), EvaluationError> {
    let format = ExportFormat::from_path(path)?;
    let mut writer = create(path)?;
    write_training_pairs(pairs, &mut writer, format)?;
    writer.flush()?;
    info!("💾 {} labeled pairs written to {}", pairs.len(), path.display());
    Ok(())
}

pub fn export_report(report: &AnalysisReport, path: &Path) -> Result<(), EvaluationError> {
    let mut writer = create(path)?;
    write_report(report, &mut writer)?;
    writer.flush()?;
    info!("💾 Analysis report written to {}", path.display());
    Ok(())
}

/// Format is taken from the extension.
pub fn import_training_pairs(path: &Path) -> Result<Vec<LabeledPair>, EvaluationError> {
    let format = ExportFormat::from_path(path)?;
    let file = File::open(path).map_err(|e| EvaluationError::file(path, e))?;
    let pairs = read_training_pairs(BufReader::new(file), format)?;
    info!("📥 Imported {} labeled pairs from {} ({})", pairs.len(), path.display(), format);
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::analyzer::SimilarityAnalyzer;
    use crate::evaluation::metrics::ConfusionMatrix;
    use crate::similarity::PipelineConfig;
    use std::time::Duration;

    fn report() -> AnalysisReport {
        let analyzer = SimilarityAnalyzer::new(PipelineConfig::fast_config()).unwrap();
        analyzer.analyze_pairs(&[
            ("ООО \"Ромашка\", Москва".to_string(), "ооо ромашка москва".to_string()),
            ("ромашка".to_string(), "лютик".to_string()),
        ])
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out/pairs.TSV")).unwrap(), ExportFormat::Tsv);
        assert_eq!(ExportFormat::from_path(Path::new("pairs.json")).unwrap(), ExportFormat::Json);
        assert!(matches!(
            ExportFormat::from_path(Path::new("pairs.xlsx")),
            Err(EvaluationError::UnsupportedFormat(ext)) if ext == "xlsx"
        ));
        assert!(ExportFormat::from_path(Path::new("pairs")).is_err());
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_analysis_csv_has_a_column_per_algorithm() {
        let mut out = Vec::new();
        write_analysis(&report(), &mut out, ExportFormat::Csv).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "text1,text2,similarity,is_duplicate,confidence,damerau_levenshtein,jaccard");
        // Embedded quotes and commas are quoted.
        assert!(lines[1].starts_with("\"ООО \"\"Ромашка\"\", Москва\",ооо ромашка москва,1.0000,true,"));
        assert!(lines[2].starts_with("ромашка,лютик,0.0000,false,1.0000,"));
    }

    #[test]
    fn test_analysis_tsv_and_json() {
        let mut tsv = Vec::new();
        write_analysis(&report(), &mut tsv, ExportFormat::Tsv).unwrap();
        let tsv = String::from_utf8(tsv).unwrap();
        assert!(tsv.starts_with("text1\ttext2\tsimilarity\t"));

        let mut json = Vec::new();
        write_analysis(&report(), &mut json, ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["statistics"]["total"], 2);
        assert!(value["recommendations"].as_array().is_some_and(|r| !r.is_empty()));
    }

    #[test]
    fn test_results_csv_is_ranked() {
        let results = vec![
            EvaluationResult::new("weak", 0.8, ConfusionMatrix::new(1, 1, 1, 1), Duration::ZERO),
            EvaluationResult::new("strong", 0.9, ConfusionMatrix::new(2, 2, 0, 0), Duration::ZERO),
        ];
        let mut out = Vec::new();
        write_results(&results, &mut out, ExportFormat::Csv).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("name,threshold,precision,recall,f1,"));
        assert_eq!(lines[1], "strong,0.90,1.0000,1.0000,1.0000,1.0000,1.0000,2,2,0,0,0.0");
        assert!(lines[2].starts_with("weak,0.80,0.5000,"));
    }

    #[test]
    fn test_reads_pairs_with_aliased_headers() {
        let input = "String1,String2,IsDuplicate\n\
                     \"Болт М10, оцинк.\",болт м10 оцинкованный,true\n\
                     гайка,шайба,0\n\
                     одно поле\n\
                     болт,винт,maybe\n\
                     ромашка,ромашка,YES\n";
        let pairs = read_training_pairs(input.as_bytes(), ExportFormat::Csv).unwrap();
        assert_eq!(
            pairs,
            vec![
                LabeledPair::new("Болт М10, оцинк.", "болт м10 оцинкованный", true),
                LabeledPair::new("гайка", "шайба", false),
                LabeledPair::new("ромашка", "ромашка", true),
            ]
        );
    }

    #[test]
    fn test_reads_tsv_in_any_column_order() {
        let input = "label\ts2\ts1\n1\tb\ta\n\tc d\tc\n";
        let pairs = read_training_pairs(input.as_bytes(), ExportFormat::Tsv).unwrap();
        assert_eq!(pairs, vec![LabeledPair::new("a", "b", true), LabeledPair::new("c", "c d", false)]);

        let missing = read_training_pairs("text1,text2\na,b\n".as_bytes(), ExportFormat::Csv);
        assert!(matches!(missing, Err(EvaluationError::MissingColumn("is_duplicate"))));
    }

    #[test]
    fn test_training_pairs_survive_csv_quoting() {
        let pairs = vec![
            LabeledPair::new("ООО \"Вектор\"", "Вектор, ООО", true),
            LabeledPair::new("a\tb", "line\nbreak", false),
        ];
        let mut out = Vec::new();
        write_training_pairs(&pairs, &mut out, ExportFormat::Csv).unwrap();
        assert_eq!(read_training_pairs(out.as_slice(), ExportFormat::Csv).unwrap(), pairs);

        let json = r#"[{"text1": "a", "text2": "b", "is_duplicate": true}]"#;
        let from_json = read_training_pairs(json.as_bytes(), ExportFormat::Json).unwrap();
        assert_eq!(from_json, vec![LabeledPair::new("a", "b", true)]);
    }

    #[test]
    fn test_markdown_report_sections() {
        let mut out = Vec::new();
        write_report(&report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# Similarity analysis\n"));
        assert!(text.contains("- Duplicates: 1 (50.0%)"));
        assert!(text.contains("## Recommendations\n\n1. "));
        assert!(text.contains("| ромашка | лютик | 0.0000 | false | 1.0000 |"));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = import_training_pairs(Path::new("/nonexistent/pairs.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pairs.csv"));
    }
}
