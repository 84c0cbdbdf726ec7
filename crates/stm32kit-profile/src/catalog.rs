//! On-disk catalog of packs and boards.

use std::path::{Path, PathBuf};

use crate::board::Board;
use crate::error::{ProfileError, Result};
use crate::pack::Pack;
use crate::parse::{discover_boards, discover_packs, load_board_toml, load_pack_toml};
use crate::pin::PinRequest;
use crate::profile::MergedProfile;

/// A catalog root holding `packs/` and `boards/`.
///
/// Declarations are loaded lazily, one identifier at a time.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProfileError::Io {
                path: root,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "catalog root is not a directory",
                ),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pack identifiers, sorted.
    pub fn packs(&self) -> Result<Vec<String>> {
        Ok(discover_packs(&self.root)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Board identifiers, sorted.
    pub fn boards(&self) -> Result<Vec<String>> {
        Ok(discover_boards(&self.root)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    pub fn pack(&self, id: &str) -> Result<Pack> {
        let path = self.root.join("packs").join(id).join("pack.toml");
        if !is_plain_id(id) || !path.is_file() {
            return Err(ProfileError::Reference {
                kind: "pack",
                id: id.to_string(),
                referenced_by: None,
            });
        }
        let pack = load_pack_toml(&path)?;
        if pack.id != id {
            return Err(ProfileError::schema(
                path.display().to_string(),
                format!("declares id '{}' but lives under packs/{id}", pack.id),
            ));
        }
        log::debug!("loaded pack '{id}' from {}", path.display());
        Ok(pack)
    }

    pub fn board(&self, id: &str) -> Result<Board> {
        let path = self.root.join("boards").join(format!("{id}.toml"));
        if !is_plain_id(id) || !path.is_file() {
            return Err(ProfileError::Reference {
                kind: "board",
                id: id.to_string(),
                referenced_by: None,
            });
        }
        let board = load_board_toml(&path)?;
        if board.id != id {
            return Err(ProfileError::schema(
                path.display().to_string(),
                format!("declares id '{}' but is named {id}.toml", board.id),
            ));
        }
        log::debug!("loaded board '{id}' from {}", path.display());
        Ok(board)
    }

    /// Load a board and its pack, then merge them for `request`.
    pub fn resolve(&self, board_id: &str, request: &PinRequest) -> Result<MergedProfile> {
        let board = self.board(board_id)?;
        let pack = self.pack(&board.pack).map_err(|e| match e {
            ProfileError::Reference { kind, id, .. } => ProfileError::Reference {
                kind,
                id,
                referenced_by: Some(board.id.clone()),
            },
            other => other,
        })?;
        MergedProfile::merge(pack, board, request)
    }
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::fixtures::{BOARD_TOML, PACK_TOML};

    fn catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let pack_dir = dir.path().join("packs/stm32l5");
        std::fs::create_dir_all(pack_dir.join("templates")).unwrap();
        std::fs::write(pack_dir.join("pack.toml"), PACK_TOML).unwrap();
        std::fs::create_dir_all(dir.path().join("boards")).unwrap();
        std::fs::write(dir.path().join("boards/nucleo_l552ze_q.toml"), BOARD_TOML).unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn lists_and_resolves() {
        let (_dir, catalog) = catalog();
        assert_eq!(catalog.packs().unwrap(), ["stm32l5"]);
        assert_eq!(catalog.boards().unwrap(), ["nucleo_l552ze_q"]);
        let profile = catalog
            .resolve("nucleo_l552ze_q", &PinRequest::default())
            .unwrap();
        assert_eq!(profile.pack.root, catalog.root().join("packs/stm32l5"));
        assert_eq!(profile.pins().led().unwrap().name, "LD2");
    }

    #[test]
    fn unknown_board_is_reference_error() {
        let (_dir, catalog) = catalog();
        let err = catalog.resolve("nucleo_h743zi", &PinRequest::default()).unwrap_err();
        assert!(matches!(err, ProfileError::Reference { kind: "board", .. }));
    }

    #[test]
    fn dangling_pack_reference_names_board() {
        let (dir, catalog) = catalog();
        let orphan = BOARD_TOML
            .replace("id = \"nucleo_l552ze_q\"", "id = \"orphan\"")
            .replace("pack = \"stm32l5\"", "pack = \"stm32g4\"");
        std::fs::write(dir.path().join("boards/orphan.toml"), orphan).unwrap();
        let err = catalog.resolve("orphan", &PinRequest::default()).unwrap_err();
        match err {
            ProfileError::Reference { kind, id, referenced_by } => {
                assert_eq!(kind, "pack");
                assert_eq!(id, "stm32g4");
                assert_eq!(referenced_by.as_deref(), Some("orphan"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn id_must_match_file_name() {
        let (dir, catalog) = catalog();
        std::fs::write(dir.path().join("boards/other.toml"), BOARD_TOML).unwrap();
        assert!(matches!(
            catalog.board("other"),
            Err(ProfileError::Schema { .. })
        ));
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let (_dir, catalog) = catalog();
        assert!(matches!(
            catalog.pack("../stm32l5"),
            Err(ProfileError::Reference { .. })
        ));
    }

    #[test]
    fn open_missing_root() {
        assert!(Catalog::open("/nonexistent/stm32kit").is_err());
    }
}
