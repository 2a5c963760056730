//! Whole-buffer helpers that drive a [`CodecEngine`] to completion.

use crate::engine::{CodecEngine, EngineParams, Mode, Status};
use crate::error::CodecError;

const SCRATCH_LEN: usize = 64 * 1024;

/// Compresses `input` into a new [`Vec`].
pub fn compress_to_vec(input: &[u8], params: EngineParams) -> Result<Vec<u8>, CodecError> {
    run_to_end(CodecEngine::new(Mode::Compress, params)?, input)
}

/// Decompresses `input` into a new [`Vec`].
///
/// Bytes following the end-of-stream marker are ignored.
pub fn decompress_to_vec(input: &[u8], params: EngineParams) -> Result<Vec<u8>, CodecError> {
    run_to_end(CodecEngine::new(Mode::Decompress, params)?, input)
}

fn run_to_end(mut engine: CodecEngine, mut input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut scratch = vec![0u8; SCRATCH_LEN];
    let mut output = Vec::new();

    loop {
        let step = engine.transform(input, &mut scratch, true);
        input = &input[step.consumed..];
        output.extend_from_slice(&scratch[..step.produced]);

        match step.status {
            Status::Finished => return Ok(output),
            Status::Error(error) => return Err(error),
            Status::Continue | Status::NeedMoreOutputSpace if !step.made_progress() => {
                return Err(CodecError::NoProgress);
            }
            Status::Continue | Status::NeedMoreOutputSpace => {}
        }
    }
}
