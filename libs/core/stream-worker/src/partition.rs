//! Partition selection
//!
//! A topic is split into a fixed number of ordered sub-logs. The partition for a
//! message is derived from its key with the same murmur2 hash Kafka's default
//! partitioner uses, so equal keys always land on the same partition.

/// Kafka-compatible murmur2 (seed `0x9747b28c`).
pub fn murmur2(data: &[u8]) -> u32 {
    const SEED: u32 = 0x9747_b28c;
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let len = data.len();
    let mut h: u32 = SEED ^ (len as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        h ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Partition index for `key` in a topic with `partitions` sub-logs.
///
/// `partitions` of zero is treated as one.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let partitions = partitions.max(1);
    (murmur2(key.as_bytes()) & 0x7fff_ffff) % partitions
}

/// Name of the stream backing one partition of `topic`
pub fn partition_stream(topic: &str, partition: u32) -> String {
    format!("{}:{}", topic, partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur2_matches_kafka_reference() {
        // Reference values from Kafka's Utils.murmur2 test vectors
        assert_eq!(murmur2(b"21") as i32, -973932308);
        assert_eq!(murmur2(b"foobar") as i32, -790332482);
        assert_eq!(murmur2(b"a-little-bit-long-string") as i32, -985981536);
        assert_eq!(murmur2(b"a-little-bit-longer-string") as i32, -1486304829);
        assert_eq!(murmur2(b"lkjh234lh9fiuh90y23oiuhsafujhadof229phr9h19h89h8") as i32, -58897971);
        assert_eq!(murmur2(b"abc") as i32, 479470107);
    }

    #[test]
    fn test_same_key_same_partition() {
        let first = partition_for("1activationemail", 8);
        for _ in 0..10 {
            assert_eq!(partition_for("1activationemail", 8), first);
        }
        assert!(first < 8);
    }

    #[test]
    fn test_zero_partitions_collapses_to_one() {
        assert_eq!(partition_for("42activationemail", 0), 0);
        assert_eq!(partition_for("42activationemail", 1), 0);
    }

    #[test]
    fn test_keys_spread_over_partitions() {
        let used: std::collections::HashSet<u32> = (0..200)
            .map(|user| partition_for(&format!("{}activationemail", user), 8))
            .collect();
        assert_eq!(used.len(), 8);
    }

    #[test]
    fn test_partition_stream_name() {
        assert_eq!(partition_stream("general-email", 3), "general-email:3");
    }
}
