use sha2::{Digest, Sha256};

use crate::{
    error::{SuretyError, invalid_request},
    oracle::types::{INDEXES_PER_ORACLE, OracleIndexes},
};

/// Deterministic index source. Participants cannot pick their own slots
/// because the stream is keyed by a seed they do not control plus a
/// sequence number assigned at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexGenerator {
    seed: String,
    index_range: u8,
}

impl IndexGenerator {
    pub fn new(seed: impl Into<String>, index_range: u8) -> Result<Self, SuretyError> {
        if usize::from(index_range) < INDEXES_PER_ORACLE {
            return Err(invalid_request(format!(
                "index range {index_range} cannot hold {INDEXES_PER_ORACLE} distinct indexes"
            )));
        }
        Ok(Self {
            seed: seed.into(),
            index_range,
        })
    }

    pub fn index_range(&self) -> u8 {
        self.index_range
    }

    pub fn assign(&self, oracle_id: &str, registration_seq: u64) -> OracleIndexes {
        let mut picked: Vec<u8> = Vec::with_capacity(INDEXES_PER_ORACLE);
        let mut stream = self.stream("oracle", oracle_id, registration_seq);
        while picked.len() < INDEXES_PER_ORACLE {
            let candidate = stream.next_index(self.index_range);
            if !picked.contains(&candidate) {
                picked.push(candidate);
            }
        }
        [picked[0], picked[1], picked[2]]
    }

    pub fn request_index(&self, requester: &str, request_seq: u64) -> u8 {
        self.stream("request", requester, request_seq)
            .next_index(self.index_range)
    }

    fn stream(&self, label: &str, identity: &str, seq: u64) -> IndexStream {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.as_bytes());
        hasher.update([0u8]);
        hasher.update(label.as_bytes());
        hasher.update([0u8]);
        hasher.update(identity.as_bytes());
        hasher.update(seq.to_be_bytes());
        IndexStream {
            root: hasher.finalize().into(),
            block: [0u8; 32],
            block_no: 0,
            cursor: 32,
        }
    }
}

struct IndexStream {
    root: [u8; 32],
    block: [u8; 32],
    block_no: u64,
    cursor: usize,
}

impl IndexStream {
    fn next_index(&mut self, range: u8) -> u8 {
        // Rejection sampling keeps the distribution uniform over the range.
        let limit = u8::MAX - (u8::MAX % range);
        loop {
            let byte = self.next_byte();
            if byte < limit {
                return byte % range;
            }
        }
    }

    fn next_byte(&mut self) -> u8 {
        if self.cursor == self.block.len() {
            let mut hasher = Sha256::new();
            hasher.update(self.root);
            hasher.update(self.block_no.to_be_bytes());
            self.block = hasher.finalize().into();
            self.block_no = self.block_no.wrapping_add(1);
            self.cursor = 0;
        }
        let byte = self.block[self.cursor];
        self.cursor += 1;
        byte
    }
}
