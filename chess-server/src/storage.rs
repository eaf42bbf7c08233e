//! 对局快照存储
//!
//! 每局一个 JSON 文件，反复保存时覆盖写入。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use protocol::{GameSnapshot, SessionId, SessionState};

/// 快照存储
pub struct SnapshotStore {
    snapshots_dir: PathBuf,
}

impl SnapshotStore {
    /// 创建快照存储，目录不存在时创建
    pub fn new() -> Result<Self> {
        let snapshots_dir = default_snapshots_dir()?;
        Self::at(snapshots_dir)
    }

    /// 在指定目录创建快照存储
    pub fn at(snapshots_dir: PathBuf) -> Result<Self> {
        if !snapshots_dir.exists() {
            fs::create_dir_all(&snapshots_dir)
                .with_context(|| format!("无法创建快照目录: {:?}", snapshots_dir))?;
        }
        Ok(Self { snapshots_dir })
    }

    /// 保存快照，返回文件名
    ///
    /// 同一对局反复保存覆盖同一个文件，文件内容始终是最新局面。
    pub fn save(&self, snapshot: &GameSnapshot) -> Result<String> {
        let filename = snapshot_filename(snapshot.session_id);
        let filepath = self.snapshots_dir.join(&filename);

        let json = snapshot.to_json().context("序列化快照失败")?;
        fs::write(&filepath, json).with_context(|| format!("写入文件失败: {:?}", filepath))?;

        Ok(filename)
    }

    /// 加载指定对局的快照
    pub fn load(&self, session_id: SessionId) -> Result<GameSnapshot> {
        let filepath = self.snapshots_dir.join(snapshot_filename(session_id));

        if !filepath.exists() {
            anyhow::bail!("快照不存在: 对局 {}", session_id);
        }

        let content = fs::read_to_string(&filepath)
            .with_context(|| format!("读取文件失败: {:?}", filepath))?;
        GameSnapshot::from_json(&content).context("解析快照文件失败")
    }

    /// 列出所有快照
    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        let mut snapshots = Vec::new();

        let entries = fs::read_dir(&self.snapshots_dir)
            .with_context(|| format!("读取快照目录失败: {:?}", self.snapshots_dir))?;

        for entry in entries {
            let entry = entry.context("读取目录项失败")?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                // 跳过读不出来的文件
                Err(_) => continue,
            };
            match GameSnapshot::from_json(&content) {
                Ok(snapshot) => snapshots.push(SnapshotInfo {
                    session_id: snapshot.session_id,
                    white_player: snapshot.white_player,
                    black_player: snapshot.black_player,
                    status: snapshot.status,
                    move_count: snapshot.moves.len(),
                    saved_at: snapshot.saved_at,
                }),
                // 跳过损坏的文件
                Err(_) => continue,
            }
        }

        // 最新的在前
        snapshots.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(snapshots)
    }

    /// 删除指定对局的快照
    pub fn delete(&self, session_id: SessionId) -> Result<()> {
        let filepath = self.snapshots_dir.join(snapshot_filename(session_id));
        if filepath.exists() {
            fs::remove_file(&filepath)
                .with_context(|| format!("删除文件失败: {:?}", filepath))?;
        }
        Ok(())
    }

    pub fn snapshots_directory(&self) -> &Path {
        &self.snapshots_dir
    }
}

/// 快照列表条目
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub session_id: SessionId,
    pub white_player: String,
    pub black_player: String,
    pub status: SessionState,
    pub move_count: usize,
    pub saved_at: DateTime<Utc>,
}

/// 跨平台的默认快照目录
fn default_snapshots_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
    Ok(data_dir.join("netchess").join("snapshots"))
}

fn snapshot_filename(session_id: SessionId) -> String {
    format!("session-{}.json", session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::BoardState;
    use tempfile::TempDir;

    fn create_test_store() -> (SnapshotStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::at(temp_dir.path().to_path_buf()).unwrap();
        (store, temp_dir)
    }

    fn sample_snapshot(session_id: SessionId) -> GameSnapshot {
        GameSnapshot::new(
            session_id,
            "白方".to_string(),
            "黑方".to_string(),
            &BoardState::initial(),
            Vec::new(),
            SessionState::InProgress,
            None,
        )
    }

    #[test]
    fn test_save_and_load() {
        let (store, _temp_dir) = create_test_store();

        let snapshot = sample_snapshot(7);
        let filename = store.save(&snapshot).unwrap();
        assert_eq!(filename, "session-7.json");

        let loaded = store.load(7).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_save_overwrites() {
        let (store, _temp_dir) = create_test_store();

        store.save(&sample_snapshot(7)).unwrap();

        let mut updated = sample_snapshot(7);
        updated.moves.push("e2e4".to_string());
        store.save(&updated).unwrap();

        let loaded = store.load(7).unwrap();
        assert_eq!(loaded.moves.len(), 1);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.load(99).is_err());
    }

    #[test]
    fn test_list_skips_corrupted() {
        let (store, temp_dir) = create_test_store();

        store.save(&sample_snapshot(1)).unwrap();
        store.save(&sample_snapshot(2)).unwrap();
        fs::write(temp_dir.path().join("session-3.json"), "不是 JSON").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "忽略").unwrap();

        let snapshots = store.list().unwrap();
        assert_eq!(snapshots.len(), 2);
    }

    #[test]
    fn test_delete() {
        let (store, _temp_dir) = create_test_store();

        store.save(&sample_snapshot(7)).unwrap();
        store.delete(7).unwrap();

        assert!(store.load(7).is_err());
        // 删除不存在的快照不报错
        store.delete(7).unwrap();
    }
}
