//! The alphabet module contains the trace provider and one-step VM of the alphabet fault dispute
//! game, where the state at trace index `i` is the `i`th letter of a string.

use super::{Claim, FaultError, FaultResult, PreimageOracle, StepVerifier, TraceProvider};
use ethers::{
    abi::{self, Token},
    types::{Bytes, U256},
    utils::keccak256,
};

/// The letter preceding `a`; the absolute pre-state of every alphabet game.
pub const ABSOLUTE_PRESTATE_LETTER: u8 = 96;

/// Returns the preimage of the alphabet absolute pre-state.
pub fn absolute_prestate() -> Bytes {
    abi::encode(&[Token::Uint(U256::from(ABSOLUTE_PRESTATE_LETTER))]).into()
}

/// Returns the commitment to the alphabet absolute pre-state.
pub fn absolute_prestate_claim() -> Claim {
    Claim::from(keccak256(absolute_prestate()))
}

fn encode_state(trace_index: U256, letter: U256) -> Vec<u8> {
    abi::encode(&[Token::Uint(trace_index), Token::Uint(letter)])
}

/// An alphabet trace: the commitment at index `i` is `keccak256(abi.encode(i, letter_i))`.
#[derive(Debug, Clone)]
pub struct AlphabetTraceProvider {
    /// Our full execution trace.
    state: Vec<u8>,
    /// The maximum depth of the games this trace is played in.
    max_depth: u64,
}

impl AlphabetTraceProvider {
    /// Creates a new [AlphabetTraceProvider] from a string of letters.
    pub fn new(alphabet: &str, max_depth: u64) -> FaultResult<Self> {
        if alphabet.is_empty() {
            return Err(FaultError::InvalidStateData(
                "alphabet trace is empty".to_string(),
            ));
        }
        Ok(Self {
            state: alphabet.as_bytes().to_vec(),
            max_depth,
        })
    }

    /// Returns the largest trace index of a game of `max_depth`.
    pub fn max_index(&self) -> u64 {
        1u64.checked_shl(self.max_depth as u32)
            .map_or(u64::MAX, |width| width - 1)
    }
}

impl TraceProvider for AlphabetTraceProvider {
    fn get(&self, trace_index: u64) -> FaultResult<Claim> {
        Ok(Claim::from(keccak256(self.preimage(trace_index)?)))
    }
}

impl PreimageOracle for AlphabetTraceProvider {
    fn preimage(&self, trace_index: u64) -> FaultResult<Bytes> {
        if trace_index > self.max_index() {
            return Err(FaultError::TraceIndexOutOfBounds {
                index: trace_index,
                max: self.max_index(),
            });
        }
        // A short trace is extended with its final state.
        let last = self.state.len() as u64 - 1;
        let index = trace_index.min(last);
        let letter = self.state[index as usize];
        Ok(encode_state(U256::from(index), U256::from(letter)).into())
    }

    fn absolute_prestate(&self) -> Bytes {
        absolute_prestate()
    }
}

/// The alphabet VM: a single step advances the trace index and the letter by one.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphabetVm;

fn word(data: &[u8], n: usize) -> FaultResult<U256> {
    data.get(n * 32..(n + 1) * 32)
        .map(U256::from_big_endian)
        .ok_or_else(|| {
            FaultError::InvalidStateData(format!(
                "expected at least {} bytes, got {}",
                (n + 1) * 32,
                data.len()
            ))
        })
}

impl StepVerifier for AlphabetVm {
    fn step(&self, state_data: &[u8], _proof: &[u8]) -> FaultResult<Claim> {
        let (trace_index, letter) =
            if Claim::from(keccak256(state_data)) == absolute_prestate_claim() {
                (U256::zero(), word(state_data, 0)?)
            } else {
                let index = word(state_data, 0)?
                    .checked_add(U256::one())
                    .ok_or_else(|| FaultError::InvalidStateData("trace index overflow".into()))?;
                (index, word(state_data, 1)?)
            };
        let next = letter
            .checked_add(U256::one())
            .ok_or_else(|| FaultError::InvalidStateData("letter overflow".into()))?;
        Ok(Claim::from(keccak256(encode_state(trace_index, next))))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALPHABET: &str = "abcdefghijklmnop";

    #[test]
    fn commitments_are_deterministic() {
        let trace = AlphabetTraceProvider::new(ALPHABET, 4).unwrap();
        assert_eq!(trace.get(7).unwrap(), trace.get(7).unwrap());
        assert_ne!(trace.get(7).unwrap(), trace.get(8).unwrap());
        let other = AlphabetTraceProvider::new("abcdexyzijklmnop", 4).unwrap();
        assert_eq!(trace.get(4).unwrap(), other.get(4).unwrap());
        assert_ne!(trace.get(5).unwrap(), other.get(5).unwrap());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let trace = AlphabetTraceProvider::new(ALPHABET, 4).unwrap();
        assert_eq!(
            trace.get(16),
            Err(FaultError::TraceIndexOutOfBounds { index: 16, max: 15 })
        );
    }

    #[test]
    fn short_trace_repeats_final_state() {
        let trace = AlphabetTraceProvider::new("abc", 4).unwrap();
        assert_eq!(trace.get(15).unwrap(), trace.get(2).unwrap());
        assert!(AlphabetTraceProvider::new("", 4).is_err());
    }

    #[test]
    fn vm_steps_to_next_letter() {
        let trace = AlphabetTraceProvider::new(ALPHABET, 4).unwrap();
        let vm = AlphabetVm;
        for i in 0..15 {
            let pre = trace.preimage(i).unwrap();
            assert_eq!(vm.step(&pre, &[]).unwrap(), trace.get(i + 1).unwrap());
        }
        assert_eq!(
            vm.step(&trace.absolute_prestate(), &[]).unwrap(),
            trace.get(0).unwrap()
        );
        assert!(matches!(
            vm.step(&[0u8; 40], &[]),
            Err(FaultError::InvalidStateData(_))
        ));
    }
}
