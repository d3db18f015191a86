use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use super::error::AppError;
use crate::domain::Record;
use crate::endpoint::{DEFAULT_HIGH_WATER_MARK, Endpoint, EndpointError, pipelines};
use crate::io::{CsvRecordStream, IoError, KeySummary, split_endpoint, write_summary};
use crate::routing::Classifier;
use crate::streaming::{
    DemuxOptions, DemuxSession, Demultiplexer, DestroyHandle, SessionReport,
};

pub const USAGE: &str = "Usage: demux <input.csv> --by <column> [--split <dir>] [--no-remux] \
                         [--high-water-mark <n>] [-v|-vv]";

/// Flags of the `demux` binary that take a value
pub const VALUE_FLAGS: &[&str] = &["--by", "--split", "--high-water-mark"];

/// Parsed command line of the `demux` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxArgs {
    pub input: PathBuf,
    /// Column whose value is the routing key
    pub by: String,
    /// Directory receiving one `<key>.csv` per key
    pub split_dir: Option<PathBuf>,
    pub remultiplex: bool,
    pub high_water_mark: usize,
}

impl DemuxArgs {
    /// Parse and validate command-line arguments (program name first)
    pub fn parse(args: Vec<String>) -> Result<Self, AppError> {
        let mut input = None;
        let mut by = None;
        let mut split_dir = None;
        let mut remultiplex = true;
        let mut high_water_mark = DEFAULT_HIGH_WATER_MARK;

        let mut args = args.into_iter().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--by" => by = Some(flag_value(&mut args, "--by")?),
                "--split" => split_dir = Some(PathBuf::from(flag_value(&mut args, "--split")?)),
                "--no-remux" => remultiplex = false,
                "--high-water-mark" => {
                    let raw = flag_value(&mut args, "--high-water-mark")?;
                    high_water_mark = match raw.parse::<usize>() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            return Err(AppError::InvalidArguments(format!(
                                "--high-water-mark must be a positive integer, got {raw:?}"
                            )));
                        }
                    };
                }
                flag if flag.starts_with("--") => {
                    return Err(AppError::InvalidArguments(format!(
                        "unknown flag {flag}\n{USAGE}"
                    )));
                }
                _ if input.is_none() => input = Some(PathBuf::from(arg)),
                _ => {
                    return Err(AppError::InvalidArguments(format!(
                        "unexpected argument {arg:?}\n{USAGE}"
                    )));
                }
            }
        }

        let (Some(input), Some(by)) = (input, by) else {
            return Err(AppError::InvalidArguments(USAGE.to_string()));
        };
        Ok(Self {
            input,
            by,
            split_dir,
            remultiplex,
            high_water_mark,
        })
    }
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, AppError> {
    args.next()
        .ok_or_else(|| AppError::InvalidArguments(format!("{flag} needs a value\n{USAGE}")))
}

/// Endpoint counting the rows of one key, emitting the count once its input ends
pub fn count_endpoint(key: &str, high_water_mark: usize) -> Endpoint<Record, KeySummary> {
    let initial = KeySummary {
        key: key.to_owned(),
        rows: 0,
    };
    pipelines::reduce(
        format!("{key}/count"),
        high_water_mark,
        initial,
        |mut summary, _record: Record| {
            summary.rows += 1;
            Ok(summary)
        },
    )
}

/// Counting endpoints, writing each key's rows to its own file when `split_dir` is set
fn summary_factory(
    split_dir: Option<PathBuf>,
    high_water_mark: usize,
) -> impl FnMut(&str, &Record) -> Result<Endpoint<Record, KeySummary>, EndpointError> + Send + 'static
{
    move |key: &str, first: &Record| match &split_dir {
        Some(dir) => split_endpoint(key, dir, first.headers().to_vec(), high_water_mark),
        None => Ok(count_endpoint(key, high_water_mark)),
    }
}

async fn open_input(path: &Path) -> Result<CsvRecordStream, AppError> {
    match CsvRecordStream::from_file(path).await {
        Ok(stream) => Ok(stream),
        Err(IoError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            Err(AppError::FileNotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Route the input file by key, writing the `key,rows` summary to `stdout`
///
/// `handle` lets the caller tear the run down early (e.g. on a signal).
pub async fn run_demux<W>(
    args: &DemuxArgs,
    mut stdout: W,
    handle: DestroyHandle,
) -> Result<SessionReport, AppError>
where
    W: AsyncWrite + Unpin + Send,
{
    let input = open_input(&args.input).await?;
    if let Some(dir) = &args.split_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let demux = Demultiplexer::new(
        summary_factory(args.split_dir.clone(), args.high_water_mark),
        Classifier::by_field(args.by.as_str()),
        DemuxOptions::default().with_remultiplex(args.remultiplex),
    );
    let mut session = DemuxSession::new(demux).with_destroy_handle(handle);
    let output = session.output();
    let collect = async move {
        match output {
            Some(output) => output.collect::<Vec<KeySummary>>().await,
            None => Vec::new(),
        }
    };

    let (report, mut summaries) = tokio::join!(session.run(input), collect);
    let report = report?;
    info!(
        keys = report.keys,
        chunks = report.chunks_routed,
        skipped = report.input_errors + report.routing_errors,
        "Input routed"
    );

    if args.remultiplex && report.is_complete() {
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        write_summary(&summaries, &mut stdout).await?;
    }
    stdout.flush().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_required_and_optional_flags() {
        let parsed = DemuxArgs::parse(args(&[
            "demux",
            "in.csv",
            "--by",
            "type",
            "--split",
            "out",
            "--no-remux",
            "--high-water-mark",
            "4",
        ]))
        .unwrap();

        assert_eq!(
            parsed,
            DemuxArgs {
                input: PathBuf::from("in.csv"),
                by: "type".to_string(),
                split_dir: Some(PathBuf::from("out")),
                remultiplex: false,
                high_water_mark: 4,
            }
        );
    }

    #[test]
    fn defaults_optional_flags() {
        let parsed = DemuxArgs::parse(args(&["demux", "--by", "type", "in.csv"])).unwrap();
        assert!(parsed.remultiplex);
        assert_eq!(parsed.split_dir, None);
        assert_eq!(parsed.high_water_mark, DEFAULT_HIGH_WATER_MARK);
    }

    #[test]
    fn flag_value_may_look_like_a_verbosity_flag() {
        let value_flags = args(VALUE_FLAGS);
        let (verbosity, rest) = crate::app::cli::split_verbosity(
            args(&["demux", "in.csv", "--by", "-v", "-vv"]),
            &value_flags,
        );
        assert_eq!(verbosity, 2);
        assert_eq!(DemuxArgs::parse(rest).unwrap().by, "-v");
    }

    #[test]
    fn rejects_bad_arguments() {
        let rejected: [&[&str]; 6] = [
            &["demux"],
            &["demux", "in.csv"],
            &["demux", "in.csv", "--by"],
            &["demux", "in.csv", "--by", "t", "--high-water-mark", "0"],
            &["demux", "in.csv", "--by", "t", "--bogus"],
            &["demux", "a.csv", "b.csv", "--by", "t"],
        ];
        for bad in rejected {
            assert!(
                matches!(DemuxArgs::parse(args(bad)), Err(AppError::InvalidArguments(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn count_endpoint_emits_row_count() {
        let mut endpoint = count_endpoint("a", 4);
        let source = endpoint.take_source().unwrap();
        for _ in 0..3 {
            endpoint
                .sink_mut()
                .write(Record::from_pairs([("type", "a")]))
                .unwrap();
        }
        endpoint.sink_mut().end();

        let out: Vec<KeySummary> = source.collect().await;
        assert_eq!(
            out,
            vec![KeySummary {
                key: "a".to_string(),
                rows: 3
            }]
        );
    }

    #[tokio::test]
    async fn missing_input_is_file_not_found() {
        let args = DemuxArgs::parse(args(&["demux", "/no/such/input.csv", "--by", "t"])).unwrap();
        let result = run_demux(&args, Vec::new(), DestroyHandle::new()).await;
        assert!(matches!(result, Err(AppError::FileNotFound(_))));
    }
}
