//! Running a job over CSV rows.

use crate::config::OnError;
use crate::logging::Verbosity;
use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use rhi_graft_core::{
    EngineOptions, HostError, InputColumn, Job, OutputRow, Row, RowBuffer, Sink, Source,
    Transformer, build_transformer,
};
use rhi_graft_rhai::RhaiEngine;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A job file together with the directory its relative paths resolve against.
pub struct LoadedJob {
    pub job: Job,
    base: PathBuf,
}

impl LoadedJob {
    pub fn load(path: &Path) -> Result<Self> {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read job {}", path.display()))?;
        let job = Job::from_bytes(&data, path.to_str())
            .with_context(|| format!("invalid job {}", path.display()))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { job, base })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }

    /// Build the job's transformer. `defaults` apply when the job sets no engine limits.
    pub fn transformer(
        &self,
        defaults: Option<&EngineOptions>,
        sink: Arc<RowBuffer>,
    ) -> Box<dyn Transformer> {
        let options = self
            .job
            .engine
            .clone()
            .or_else(|| defaults.cloned())
            .unwrap_or_default();
        tracing::debug!(?options, kind = %self.job.transformer.kind(), "building transformer");
        build_transformer(
            Arc::new(RhaiEngine::with_options(options)),
            self.job.transformer.clone(),
            sink,
        )
    }
}

/// Options of the `run` command.
pub struct RunOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub threads: usize,
    pub on_error: OnError,
}

/// Counts reported after a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: usize,
    pub rows: usize,
    pub failed: usize,
}

pub fn run(
    loaded: &LoadedJob,
    engine: Option<&EngineOptions>,
    options: &RunOptions,
    v: Verbosity,
) -> Result<RunSummary> {
    let sink = Arc::new(RowBuffer::new());
    let mut transformer = loaded.transformer(engine, sink.clone());
    let mut summary = RunSummary::default();

    let rows = read_rows(loaded, options, &mut summary)?;

    let output_path = options
        .output
        .clone()
        .or_else(|| match &loaded.job.sink {
            Some(Sink::File { path }) => Some(loaded.resolve(path)),
            None => None,
        });

    // Load the script before creating the output file.
    transformer.initialize().context("failed to initialize transformer")?;

    let mut writer = match open_writer(output_path.as_deref(), &transformer.output_columns()) {
        Ok(writer) => writer,
        Err(e) => {
            if let Err(close) = transformer.close() {
                tracing::warn!(error = %close, "failed to close transformer");
            }
            return Err(e);
        }
    };

    let pb = progress_bar(rows.len(), v);
    let t = transformer.as_ref();
    let result = if options.threads > 1 {
        run_parallel(t, &sink, &rows, options, &mut writer, &mut summary)
    } else {
        let pb = pb.as_ref();
        run_sequential(t, &sink, &rows, options, &mut writer, &mut summary, pb)
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    // The finalizer runs even when the run was aborted.
    let closed = transformer.close();
    result?;
    closed.context("failed to close transformer")?;

    // Rows the finalizer emitted.
    for row in sink.drain() {
        write_row(&mut writer, &row, &mut summary)?;
    }
    writer.flush().context("failed to flush output")?;

    if output_path.is_some() {
        v.info(&format!(
            "{} record(s) in, {} row(s) out, {} failed",
            summary.records, summary.rows, summary.failed
        ));
    }
    Ok(summary)
}

fn run_sequential(
    transformer: &dyn Transformer,
    sink: &RowBuffer,
    rows: &[Row],
    options: &RunOptions,
    writer: &mut csv::Writer<Box<dyn Write>>,
    summary: &mut RunSummary,
    pb: Option<&ProgressBar>,
) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        let result = transformer.transform(row);
        record_result(index, result, options.on_error, writer, summary)?;
        for out in sink.drain() {
            write_row(writer, &out, summary)?;
        }
        if let Some(pb) = pb {
            pb.inc(1);
        }
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn run_parallel(
    transformer: &dyn Transformer,
    sink: &RowBuffer,
    rows: &[Row],
    options: &RunOptions,
    writer: &mut csv::Writer<Box<dyn Write>>,
    summary: &mut RunSummary,
) -> Result<()> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .context("failed to build thread pool")?;
    tracing::debug!(threads = options.threads, "processing rows in parallel");

    let results: Vec<_> =
        pool.install(|| rows.par_iter().map(|row| transformer.transform(row)).collect());

    for (index, result) in results.into_iter().enumerate() {
        record_result(index, result, options.on_error, writer, summary)?;
    }
    // Collector rows arrive grouped per record but in completion order.
    for out in sink.drain() {
        write_row(writer, &out, summary)?;
    }
    Ok(())
}

#[cfg(not(feature = "parallel"))]
fn run_parallel(
    transformer: &dyn Transformer,
    sink: &RowBuffer,
    rows: &[Row],
    options: &RunOptions,
    writer: &mut csv::Writer<Box<dyn Write>>,
    summary: &mut RunSummary,
) -> Result<()> {
    tracing::warn!(
        threads = options.threads,
        "built without the `parallel` feature; processing rows sequentially"
    );
    run_sequential(transformer, sink, rows, options, writer, summary, None)
}

fn record_result(
    index: usize,
    result: Result<Option<OutputRow>, HostError>,
    on_error: OnError,
    writer: &mut csv::Writer<Box<dyn Write>>,
    summary: &mut RunSummary,
) -> Result<()> {
    summary.records += 1;
    match result {
        Ok(Some(row)) => write_row(writer, &row, summary),
        Ok(None) => Ok(()),
        Err(e) if on_error == OnError::Skip && !e.is_usage_error() => {
            tracing::warn!(record = index + 1, error = %e, "skipping record");
            summary.failed += 1;
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("record {} failed", index + 1)),
    }
}

fn write_row(
    writer: &mut csv::Writer<Box<dyn Write>>,
    row: &OutputRow,
    summary: &mut RunSummary,
) -> Result<()> {
    writer
        .write_record(row.iter().map(|field| field.as_deref().unwrap_or("")))
        .context("failed to write output row")?;
    summary.rows += 1;
    Ok(())
}

/// Open the output and write the header row.
fn open_writer(path: Option<&Path>, header: &[String]) -> Result<csv::Writer<Box<dyn Write>>> {
    let out: Box<dyn Write> = match path {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create output {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    // Advanced scripts may emit rows narrower or wider than the header.
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    writer.write_record(header).context("failed to write header")?;
    Ok(writer)
}

fn progress_bar(len: usize, v: Verbosity) -> Option<ProgressBar> {
    if v.is_quiet() || len < 2 {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    Some(pb)
}

/// Load the input rows: `--input` first, then the job's source.
fn read_rows(loaded: &LoadedJob, options: &RunOptions, summary: &mut RunSummary) -> Result<Vec<Row>> {
    let path = match (&options.input, &loaded.job.source) {
        (Some(path), _) => path.clone(),
        (None, Some(Source::File { path })) => loaded.resolve(path),
        (None, Some(source @ Source::Inline { .. })) => return Ok(source.rows().unwrap_or_default()),
        (None, None) => bail!("job has no source; pass --input"),
    };

    let file =
        File::open(&path).with_context(|| format!("failed to open input {}", path.display()))?;
    read_csv(file, loaded.job.transformer.inputs(), options.on_error, summary)
        .with_context(|| format!("failed to read input {}", path.display()))
}

/// Read CSV records with a header row, parsing the declared input columns.
fn read_csv(
    input: impl io::Read,
    columns: &[InputColumn],
    on_error: OnError,
    summary: &mut RunSummary,
) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().context("failed to read header")?.clone();

    let positions = columns
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h == column.name)
                .with_context(|| format!("input column '{}' not found in header", column.name))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        match parse_record(&record, columns, &positions) {
            Ok(row) => rows.push(row),
            Err(e) if on_error == OnError::Skip => {
                tracing::warn!(record = index + 1, error = %e, "skipping unreadable record");
                summary.records += 1;
                summary.failed += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("record {}", index + 1)),
        }
    }
    Ok(rows)
}

fn parse_record(
    record: &csv::StringRecord,
    columns: &[InputColumn],
    positions: &[usize],
) -> Result<Row, HostError> {
    let mut row = Row::new();
    for (column, &pos) in columns.iter().zip(positions) {
        let raw = record.get(pos).unwrap_or("");
        row.insert(column.name.clone(), column.column_type.parse_text(raw)?);
    }
    Ok(row)
}
