//! PFT (Protection, Fragmentation and Transport) layer, ETSI TS 102 693
//! §6: splits an AF packet into UDP-sized PF fragments, optionally
//! protected by Reed-Solomon forward error correction.

use reed_solomon_erasure::ReedSolomon;
use serde::{Deserialize, Serialize};

use crate::crc::stored_crc16;

const PF_SYNC: [u8; 2] = *b"PF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PftConfig {
    pub fec: bool,
    /// Number of extra parity fragments beyond the minimum RS(k, k) needs.
    pub fec_m: u8,
    pub max_fragment_size: usize,
}

impl Default for PftConfig {
    fn default() -> Self {
        PftConfig { fec: false, fec_m: 0, max_fragment_size: 1400 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfFragment {
    pub pseq: u16,
    pub findex: u32, // 24 bits
    pub fcount: u32, // 24 bits
    pub fec: bool,
    pub addr: bool,
    pub rs_k: u8,
    pub rs_z: u8,
    pub source: u16,
    pub dest: u16,
    pub payload: Vec<u8>,
}

impl PfFragment {
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&PF_SYNC);
        out.extend_from_slice(&self.pseq.to_be_bytes());
        out.extend_from_slice(&self.findex.to_be_bytes()[1..]);
        out.extend_from_slice(&self.fcount.to_be_bytes()[1..]);
        out.push(((self.fec as u8) << 7) | ((self.addr as u8) << 6));
        if self.fec {
            out.push(self.rs_k);
            out.push(self.rs_z);
        }
        if self.addr {
            out.extend_from_slice(&self.source.to_be_bytes());
            out.extend_from_slice(&self.dest.to_be_bytes());
        }
        let crc = stored_crc16(&out);
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 13 || data[0..2] != PF_SYNC {
            return None;
        }
        let pseq = u16::from_be_bytes(data[2..4].try_into().ok()?);
        let findex = u32::from_be_bytes([0, data[4], data[5], data[6]]);
        let fcount = u32::from_be_bytes([0, data[7], data[8], data[9]]);
        let flags = data[10];
        let fec = (flags & 0x80) != 0;
        let addr = (flags & 0x40) != 0;

        let mut pos = 11;
        let (rs_k, rs_z) = if fec {
            if data.len() < pos + 2 {
                return None;
            }
            let k = data[pos];
            let z = data[pos + 1];
            pos += 2;
            (k, z)
        } else {
            (0, 0)
        };
        let (source, dest) = if addr {
            if data.len() < pos + 4 {
                return None;
            }
            let s = u16::from_be_bytes(data[pos..pos + 2].try_into().ok()?);
            let d = u16::from_be_bytes(data[pos + 2..pos + 4].try_into().ok()?);
            pos += 4;
            (s, d)
        } else {
            (0, 0)
        };
        if data.len() < pos + 2 {
            return None;
        }
        let header = &data[..pos];
        let expected_crc = stored_crc16(header);
        let actual_crc = u16::from_be_bytes(data[pos..pos + 2].try_into().ok()?);
        if expected_crc != actual_crc {
            return None;
        }
        let payload = data[pos + 2..].to_vec();
        Some(PfFragment { pseq, findex, fcount, fec, addr, rs_k, rs_z, source, dest, payload })
    }
}

pub struct PftFragmenter {
    config: PftConfig,
    pseq: u16,
}

impl PftFragmenter {
    pub fn new(config: PftConfig) -> Self {
        PftFragmenter { config, pseq: 0 }
    }

    /// Split `af_packet` into fragments, striping raw bytes when FEC is
    /// disabled and otherwise interleaving Reed-Solomon parity shards
    /// across `fec_m` extra fragments.
    pub fn fragment(&mut self, af_packet: &[u8]) -> Vec<PfFragment> {
        let pseq = self.pseq;
        self.pseq = self.pseq.wrapping_add(1);

        let fragment_size = self.config.max_fragment_size.max(1);
        let data_fragments: Vec<&[u8]> = if af_packet.is_empty() {
            vec![&[][..]]
        } else {
            af_packet.chunks(fragment_size).collect()
        };

        if !self.config.fec {
            let fcount = data_fragments.len() as u32;
            return data_fragments
                .iter()
                .enumerate()
                .map(|(i, chunk)| PfFragment {
                    pseq,
                    findex: i as u32,
                    fcount,
                    fec: false,
                    addr: false,
                    rs_k: 0,
                    rs_z: 0,
                    source: 0,
                    dest: 0,
                    payload: chunk.to_vec(),
                })
                .collect();
        }

        let rs_k = data_fragments.len();
        let rs_m = self.config.fec_m.max(1) as usize;
        let shard_len = data_fragments.iter().map(|c| c.len()).max().unwrap_or(0);
        let mut shards: Vec<Vec<u8>> = data_fragments
            .iter()
            .map(|c| {
                let mut padded = c.to_vec();
                padded.resize(shard_len, 0);
                padded
            })
            .collect();
        shards.resize(rs_k + rs_m, vec![0u8; shard_len]);

        if let Ok(rs) = ReedSolomon::<u8>::new(rs_k, rs_m) {
            let _ = rs.encode(&mut shards);
        }

        let fcount = shards.len() as u32;
        shards
            .into_iter()
            .enumerate()
            .map(|(i, shard)| PfFragment {
                pseq,
                findex: i as u32,
                fcount,
                fec: true,
                addr: false,
                rs_k: rs_k as u8,
                rs_z: (shard_len.saturating_sub(data_fragments.get(i).map_or(0, |c| c.len())))
                    as u8,
                source: 0,
                dest: 0,
                payload: shard,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_packet_yields_one_fragment() {
        let mut fragmenter = PftFragmenter::new(PftConfig { fec: false, fec_m: 0, max_fragment_size: 1400 });
        let fragments = fragmenter.fragment(b"Small packet");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].findex, 0);
        assert_eq!(fragments[0].fcount, 1);
        assert_eq!(fragments[0].payload, b"Small packet");
    }

    #[test]
    fn large_packet_splits_and_reassembles() {
        let mut fragmenter = PftFragmenter::new(PftConfig { fec: false, fec_m: 0, max_fragment_size: 100 });
        let packet = vec![b'X'; 250];
        let fragments = fragmenter.fragment(&packet);
        assert_eq!(fragments.len(), 3);
        assert!(fragments.iter().all(|f| f.fcount == 3));
        let reassembled: Vec<u8> = fragments.iter().flat_map(|f| f.payload.clone()).collect();
        assert_eq!(reassembled, packet);
    }

    #[test]
    fn sequence_number_wraps() {
        let mut fragmenter = PftFragmenter::new(PftConfig::default());
        fragmenter.pseq = 0xFFFF;
        let first = fragmenter.fragment(b"test");
        assert_eq!(first[0].pseq, 0xFFFF);
        let second = fragmenter.fragment(b"test");
        assert_eq!(second[0].pseq, 0);
    }

    #[test]
    fn fragment_round_trips_through_assemble_and_parse() {
        let fragment = PfFragment {
            pseq: 999,
            findex: 2,
            fcount: 5,
            fec: false,
            addr: false,
            rs_k: 0,
            rs_z: 0,
            source: 0,
            dest: 0,
            payload: b"The quick brown fox".to_vec(),
        };
        let data = fragment.assemble();
        let parsed = PfFragment::parse(&data).unwrap();
        assert_eq!(parsed, fragment);
    }

    #[test]
    fn invalid_sync_is_rejected() {
        let data = [b'X', b'X'].iter().chain([0u8; 20].iter()).copied().collect::<Vec<_>>();
        assert!(PfFragment::parse(&data).is_none());
    }

    #[test]
    fn corrupted_crc_is_rejected() {
        let fragment = PfFragment {
            pseq: 1,
            findex: 0,
            fcount: 1,
            fec: false,
            addr: false,
            rs_k: 0,
            rs_z: 0,
            source: 0,
            dest: 0,
            payload: b"test".to_vec(),
        };
        let mut data = fragment.assemble();
        data[12] ^= 0xFF;
        assert!(PfFragment::parse(&data).is_none());
    }
}
