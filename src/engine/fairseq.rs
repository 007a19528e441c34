use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, ThaiMtError};
use super::{DecodeOptions, Engine, EngineLoader, EngineSpec, SubwordConfig};

const STDERR_TAIL_LINES: usize = 20;

/// Builds engines backed by a resident `fairseq-interactive` process
pub struct FairseqLoader {
    config: EngineConfig,
}

impl FairseqLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    async fn check_checkpoint(path: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            ThaiMtError::EngineLoad(format!("Checkpoint {} is not readable: {}", path.display(), e))
        })?;

        if !metadata.is_file() || metadata.len() == 0 {
            return Err(ThaiMtError::EngineLoad(format!(
                "Checkpoint {} is empty or not a file",
                path.display()
            )));
        }
        Ok(())
    }

    /// Dictionaries are `<symbol> <count> [flags]` per line
    async fn check_dictionary(path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ThaiMtError::EngineLoad(format!("Dictionary {} is not readable: {}", path.display(), e))
        })?;

        let first = content.lines().next().unwrap_or_default();
        let mut fields = first.split_whitespace();
        let well_formed = fields.next().is_some()
            && fields.next().is_some_and(|count| count.parse::<u64>().is_ok());

        if !well_formed {
            return Err(ThaiMtError::EngineLoad(format!(
                "Dictionary {} is malformed (first line: {:?})",
                path.display(),
                first
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineLoader for FairseqLoader {
    async fn load(&self, spec: &EngineSpec) -> Result<Box<dyn Engine>> {
        info!("Loading fairseq checkpoint {}", spec.checkpoint.display());

        Self::check_checkpoint(&spec.checkpoint).await?;
        for lang in [spec.source_lang, spec.target_lang] {
            let dict = spec.vocab_dir.join(format!("dict.{}.txt", lang));
            Self::check_dictionary(&dict).await?;
        }

        if let Some(SubwordConfig::Sentencepiece { model }) = &spec.subword {
            if !tokio::fs::try_exists(model).await.unwrap_or(false) {
                return Err(ThaiMtError::EngineLoad(format!(
                    "Sentencepiece model {} is missing",
                    model.display()
                )));
            }
        }

        let session = Session::start(&self.config, spec)?;
        Ok(Box::new(FairseqEngine {
            decode: spec.decode,
            session: Mutex::new(Some(session)),
        }))
    }
}

fn build_args(spec: &EngineSpec, config: &EngineConfig) -> Vec<String> {
    let mut args = vec![
        spec.vocab_dir.to_string_lossy().to_string(),
        "--path".to_string(),
        spec.checkpoint.to_string_lossy().to_string(),
        "--source-lang".to_string(),
        spec.source_lang.to_string(),
        "--target-lang".to_string(),
        spec.target_lang.to_string(),
        // answer each input line as soon as it arrives
        "--buffer-size".to_string(),
        "1".to_string(),
    ];

    if let Some(beam) = spec.decode.beam {
        args.push("--beam".to_string());
        args.push(beam.to_string());
    }

    if let Some(SubwordConfig::Sentencepiece { model }) = &spec.subword {
        args.push("--bpe".to_string());
        args.push("sentencepiece".to_string());
        args.push("--sentencepiece-model".to_string());
        args.push(model.to_string_lossy().to_string());
    }

    if config.cpu {
        args.push("--cpu".to_string());
    }

    args.extend(config.extra_args.iter().cloned());
    args
}

/// Text of a `D-`/`H-` output line: `<prefix><id>\t<score>\t<text>`
fn hypothesis_text(line: &str, prefix: &str) -> Option<String> {
    if !line.starts_with(prefix) {
        return None;
    }
    line.splitn(3, '\t').nth(2).map(|text| text.trim().to_string())
}

/// Keep the last lines of stderr for error reports
async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        debug!("fairseq: {}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

/// A running `fairseq-interactive` with the model in memory
struct Session {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: JoinHandle<String>,
    child: Child,
}

impl Session {
    fn start(config: &EngineConfig, spec: &EngineSpec) -> Result<Self> {
        let args = build_args(spec, config);
        debug!("Starting {} {}", config.binary_path, args.join(" "));

        let mut child = Command::new(&config.binary_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ThaiMtError::EngineLoad(format!("Failed to execute {}: {}", config.binary_path, e))
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(ThaiMtError::EngineLoad(format!(
                "{} started without piped stdio",
                config.binary_path
            )));
        };

        Ok(Self {
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: tokio::spawn(collect_stderr(stderr)),
            child,
        })
    }

    /// Send one line and read until its hypothesis.
    ///
    /// `D-` carries the hypothesis after subword removal; `H-` is used when no
    /// `D-` follows before the `P-` scores line.
    async fn exchange(&mut self, line: &str) -> std::result::Result<String, String> {
        self.stdin
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| format!("Failed to send input: {}", e))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| format!("Failed to send input: {}", e))?;

        let mut raw = None;
        loop {
            let output = self
                .stdout
                .next_line()
                .await
                .map_err(|e| format!("Failed to read output: {}", e))?
                .ok_or_else(|| "fairseq exited before producing a hypothesis".to_string())?;

            if let Some(text) = hypothesis_text(&output, "D-") {
                return Ok(text);
            }
            if let Some(text) = hypothesis_text(&output, "H-") {
                raw = Some(text);
            } else if output.starts_with("P-") {
                if let Some(text) = raw.take() {
                    return Ok(text);
                }
            }
        }
    }

    /// Stop the process and turn `reason` into an error carrying its stderr
    async fn shut_down(mut self, reason: String) -> ThaiMtError {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        drop(self.stdin);

        let stderr = self.stderr.await.unwrap_or_default();
        if stderr.trim().is_empty() {
            ThaiMtError::Inference(reason)
        } else {
            ThaiMtError::Inference(format!("{}: {}", reason, stderr.trim()))
        }
    }
}

/// One fairseq model held by a long-lived `fairseq-interactive` process.
///
/// Dropping the engine kills the process and frees the model.
pub struct FairseqEngine {
    decode: DecodeOptions,
    session: Mutex<Option<Session>>,
}

#[async_trait]
impl Engine for FairseqEngine {
    async fn translate(&self, input: &str, options: &DecodeOptions) -> Result<String> {
        if *options != self.decode {
            return Err(ThaiMtError::Inference(format!(
                "Engine was loaded with {:?}, call asked for {:?}",
                self.decode, options
            )));
        }

        // fairseq-interactive translates line by line; keep the request a single sentence
        let line = input.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            return Ok(String::new());
        }

        let mut session = self.session.lock().await;
        let running = session.as_mut().ok_or_else(|| {
            ThaiMtError::Inference("fairseq process is no longer running".to_string())
        })?;

        let outcome = running.exchange(&line).await;
        match outcome {
            Ok(hypothesis) => Ok(hypothesis),
            Err(reason) => {
                warn!("fairseq session failed: {}", reason);
                match session.take() {
                    Some(failed) => Err(failed.shut_down(reason).await),
                    None => Err(ThaiMtError::Inference(reason)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{LanguagePair, SCB_TH_EN};
    use tempfile::TempDir;

    fn write_bundle(root: &Path, pair: LanguagePair) -> EngineSpec {
        let spec = pair.bundle().engine_spec(root);
        std::fs::create_dir_all(spec.checkpoint.parent().unwrap()).unwrap();
        std::fs::create_dir_all(&spec.vocab_dir).unwrap();
        std::fs::write(&spec.checkpoint, b"weights").unwrap();
        for lang in ["th", "en"] {
            std::fs::write(spec.vocab_dir.join(format!("dict.{}.txt", lang)), "▁the 1234\n").unwrap();
        }
        if let Some(SubwordConfig::Sentencepiece { model }) = &spec.subword {
            std::fs::create_dir_all(model.parent().unwrap()).unwrap();
            std::fs::write(model, b"spm").unwrap();
        }
        spec
    }

    /// Shell script standing in for fairseq-interactive; records its arguments once per start
    #[cfg(unix)]
    fn fake_fairseq(dir: &Path, body: &str) -> (EngineConfig, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let starts = dir.join("starts.log");
        let script = dir.join("fake-fairseq-interactive");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$*\" >> '{}'\n{}\n", starts.display(), body),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = EngineConfig {
            binary_path: script.to_string_lossy().to_string(),
            ..EngineConfig::default()
        };
        (config, starts)
    }

    #[cfg(unix)]
    const ECHO_BODY: &str = r#"while IFS= read -r line; do
  printf 'S-0\t%s\n' "$line"
  printf 'H-0\t-0.25\t%s\n' "$line"
  printf 'D-0\t-0.25\t%s\n' "$line"
  printf 'P-0\t-0.1 -0.2\n'
done"#;

    #[test]
    fn test_hypothesis_text_reads_third_field() {
        assert_eq!(hypothesis_text("D-0\t-0.31\tHello", "D-"), Some("Hello".to_string()));
        assert_eq!(
            hypothesis_text("H-3\t-0.5\tสวัสดี▁ครับ\n", "H-"),
            Some("สวัสดี▁ครับ".to_string())
        );
        assert_eq!(hypothesis_text("S-0\thello", "D-"), None);
        assert_eq!(hypothesis_text("D-0\tmissing-fields", "D-"), None);
    }

    #[test]
    fn test_build_args_includes_beam_and_sentencepiece() {
        let mut spec = SCB_TH_EN.engine_spec(Path::new("/data/scb_th_en"));
        spec.decode = DecodeOptions::with_beam(4);

        let joined = build_args(&spec, &EngineConfig::default()).join(" ");
        assert!(joined.contains("--buffer-size 1"));
        assert!(joined.contains("--beam 4"));
        assert!(joined.contains("--bpe sentencepiece"));
        assert!(joined.contains("--source-lang th --target-lang en"));

        spec.decode = DecodeOptions::default();
        let args = build_args(&spec, &EngineConfig::default());
        assert!(!args.contains(&"--beam".to_string()));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_dictionary() {
        let dir = TempDir::new().unwrap();
        let spec = write_bundle(dir.path(), LanguagePair::EnTh);
        std::fs::write(spec.vocab_dir.join("dict.th.txt"), "not-a-dictionary\n").unwrap();

        let loader = FairseqLoader::new(EngineConfig::default());
        match loader.load(&spec).await {
            Err(ThaiMtError::EngineLoad(msg)) => assert!(msg.contains("malformed")),
            Err(e) => panic!("Expected EngineLoad, got {}", e),
            Ok(_) => panic!("Expected EngineLoad, got an engine"),
        }
    }

    #[tokio::test]
    async fn test_load_rejects_missing_sentencepiece_model() {
        let dir = TempDir::new().unwrap();
        let spec = write_bundle(dir.path(), LanguagePair::ThEn);
        if let Some(SubwordConfig::Sentencepiece { model }) = &spec.subword {
            std::fs::remove_file(model).unwrap();
        }

        let loader = FairseqLoader::new(EngineConfig::default());
        assert!(matches!(loader.load(&spec).await, Err(ThaiMtError::EngineLoad(_))));
    }

    #[tokio::test]
    async fn test_load_reports_missing_binary() {
        let dir = TempDir::new().unwrap();
        let spec = write_bundle(dir.path(), LanguagePair::EnTh);
        let config = EngineConfig {
            binary_path: "thaimt-no-such-fairseq-binary".to_string(),
            ..EngineConfig::default()
        };

        let result = FairseqLoader::new(config).load(&spec).await;
        assert!(matches!(result, Err(ThaiMtError::EngineLoad(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_starts_one_process_per_load() {
        let dir = TempDir::new().unwrap();
        let mut spec = write_bundle(dir.path(), LanguagePair::ThEn);
        spec.decode = DecodeOptions::with_beam(4);
        let (config, starts) = fake_fairseq(dir.path(), ECHO_BODY);

        let engine = FairseqLoader::new(config).load(&spec).await.unwrap();
        for text in ["สวัสดี", "ขอบคุณ  ครับ", "ลาก่อน"] {
            let expected = text.split_whitespace().collect::<Vec<_>>().join(" ");
            assert_eq!(engine.translate(text, &spec.decode).await.unwrap(), expected);
        }

        let log = std::fs::read_to_string(&starts).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("--buffer-size 1"));
        assert!(log.contains("--beam 4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_raw_hypothesis_is_used_without_detokenized_line() {
        let dir = TempDir::new().unwrap();
        let spec = write_bundle(dir.path(), LanguagePair::EnTh);
        let body = r#"while IFS= read -r line; do
  printf 'H-0\t-0.5\t%s\n' "$line"
  printf 'P-0\t-0.5\n'
done"#;
        let (config, _) = fake_fairseq(dir.path(), body);

        let engine = FairseqLoader::new(config).load(&spec).await.unwrap();
        let result = engine.translate("hello", &DecodeOptions::default()).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mismatched_decode_options_are_rejected() {
        let dir = TempDir::new().unwrap();
        let spec = write_bundle(dir.path(), LanguagePair::EnTh);
        let (config, _) = fake_fairseq(dir.path(), ECHO_BODY);

        let engine = FairseqLoader::new(config).load(&spec).await.unwrap();
        let result = engine.translate("hello", &DecodeOptions::with_beam(4)).await;
        assert!(matches!(result, Err(ThaiMtError::Inference(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_reports_stderr_as_inference_error() {
        let dir = TempDir::new().unwrap();
        let spec = write_bundle(dir.path(), LanguagePair::EnTh);
        let (config, _) = fake_fairseq(dir.path(), "echo 'checkpoint is incompatible' >&2\nexit 3");

        let engine = FairseqLoader::new(config).load(&spec).await.unwrap();
        match engine.translate("hello", &DecodeOptions::default()).await {
            Err(ThaiMtError::Inference(msg)) => assert!(msg.contains("checkpoint is incompatible")),
            other => panic!("Expected Inference, got {:?}", other),
        }

        // the dead process is not reused
        let again = engine.translate("hello", &DecodeOptions::default()).await;
        assert!(matches!(again, Err(ThaiMtError::Inference(_))));
    }
}
