//! Append / lookup / size behaviour of the active log.

#[cfg(test)]
mod tests {
    use crate::commitlog::Commitlog;
    use crate::record::{Record, RecordStatus, key_hash};
    use tempfile::TempDir;

    fn append_record(log: &mut Commitlog, record: &Record) -> i64 {
        let frame = record.encode().unwrap();
        log.append(record.key_hash(), record.status, record.timestamp, &frame)
            .unwrap()
    }

    #[test]
    fn starts_empty() {
        let tmp = TempDir::new().unwrap();
        let log = Commitlog::create(tmp.path()).unwrap();
        assert_eq!(log.size(), 0);
        assert_eq!(log.count(), 0);
        assert!(log.get(key_hash("missing")).unwrap().is_none());
    }

    #[test]
    fn append_then_get() {
        let tmp = TempDir::new().unwrap();
        let mut log = Commitlog::create(tmp.path()).unwrap();

        let record = Record::new("k1", vec![0x01, 0x02]);
        let offset = append_record(&mut log, &record);
        assert_eq!(offset, 0);

        let frame = log.get(record.key_hash()).unwrap().unwrap();
        assert_eq!(Record::decode(&frame).unwrap(), record);
        assert_eq!(log.size(), frame.len() as u64);
        assert_eq!(log.count(), 1);
    }

    #[test]
    fn rewrite_returns_newest_version() {
        let tmp = TempDir::new().unwrap();
        let mut log = Commitlog::create(tmp.path()).unwrap();

        append_record(&mut log, &Record::new("k", vec![1]));
        let newer = Record::new("k", vec![2]);
        append_record(&mut log, &newer);

        let frame = log.get(newer.key_hash()).unwrap().unwrap();
        assert_eq!(Record::decode(&frame).unwrap().payload, vec![2]);
        // Both frames are on disk; the summary indexes one hash.
        assert_eq!(log.count(), 1);
    }

    #[test]
    fn tombstone_is_indexed_as_removed() {
        let tmp = TempDir::new().unwrap();
        let mut log = Commitlog::create(tmp.path()).unwrap();

        append_record(&mut log, &Record::new("k", vec![1]));
        append_record(&mut log, &Record::tombstone("k"));

        let entry = log.summary().look_up(key_hash("k")).unwrap();
        assert_eq!(entry.status, RecordStatus::Removed);
        let frame = log.get(key_hash("k")).unwrap().unwrap();
        assert!(Record::decode(&frame).unwrap().is_removed());
    }

    #[test]
    fn size_tracks_on_disk_length() {
        let tmp = TempDir::new().unwrap();
        let mut log = Commitlog::create(tmp.path()).unwrap();

        let mut expected = 0u64;
        for i in 0..25u32 {
            let record = Record::new(format!("key_{i:03}"), vec![0xAB; 100]);
            let frame = record.encode().unwrap();
            append_record(&mut log, &record);
            expected += frame.len() as u64;
        }
        assert_eq!(log.size(), expected);
        assert_eq!(std::fs::metadata(log.path()).unwrap().len(), expected);
    }
}
