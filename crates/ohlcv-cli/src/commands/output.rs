//! 조회 결과 출력 형식.

use anyhow::{Context, Result};
use ohlcv_core::Series;
use std::fs::File;
use std::io::Write;

/// 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!(
                "Invalid format: {}. Use: table, csv, json",
                s
            )),
        }
    }
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 시계열을 지정한 형식의 문자열로 변환합니다.
pub fn render_rows(rows: &Series, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).context("JSON 직렬화 실패")
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(["datetime", "open", "high", "low", "close", "volume"])?;
            for c in rows {
                writer.write_record([
                    c.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    c.open.to_string(),
                    c.high.to_string(),
                    c.low.to_string(),
                    c.close.to_string(),
                    c.volume.to_string(),
                ])?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("CSV 버퍼 flush 실패: {}", e.error()))?;
            String::from_utf8(bytes).context("CSV 인코딩 오류")
        }
        OutputFormat::Table => {
            let mut out = format!(
                "{:<19}  {:>12}  {:>12}  {:>12}  {:>12}  {:>14}\n",
                "datetime", "open", "high", "low", "close", "volume"
            );
            out.push_str(&"-".repeat(92));
            out.push('\n');
            for c in rows {
                out.push_str(&format!(
                    "{:<19}  {:>12}  {:>12}  {:>12}  {:>12}  {:>14}\n",
                    c.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    c.open.to_string(),
                    c.high.to_string(),
                    c.low.to_string(),
                    c.close.to_string(),
                    c.volume.to_string(),
                ));
            }
            Ok(out)
        }
    }
}

/// 파일 또는 stdout으로 출력합니다.
pub fn write_output(content: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            let mut file =
                File::create(path).with_context(|| format!("출력 파일 생성 실패: {}", path))?;
            file.write_all(content.as_bytes())?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
