use std::io::BufRead;
use tlm_core::SourceError;

/// Next non-empty line, trimmed of surrounding whitespace. `Ok(None)` at EOF.
pub(crate) fn next_sample<R: BufRead>(
    reader: &mut R,
    source_name: &str,
) -> Result<Option<String>, SourceError> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| SourceError::read(source_name, e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        let sample = line.trim();
        if !sample.is_empty() {
            return Ok(Some(sample.to_string()));
        }
    }
}
