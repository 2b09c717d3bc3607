//! # パス正規化
//!
//! 入力パスからコンテナ名プレフィックスを除去し、絶対URLを判別する。
//! 純粋関数であり冪等（正規化済みパスを再度正規化しても変わらない）。

use crate::error::ResolveError;

/// 正規化結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedPath {
    /// 既に完全なURL。解決不要でそのまま返す。
    Absolute(String),
    /// コンテナ内の相対パス。署名が必要。
    Relative(String),
}

/// コンテナ名プレフィックスの除去器。
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    /// 対象コンテナ以外に除去する旧来・別名のコンテナ名
    known_containers: Vec<String>,
}

fn is_absolute_url(path: &str) -> bool {
    let lower = path
        .get(..8)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| path.to_ascii_lowercase());
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl PathNormalizer {
    pub fn new<I, S>(known_containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_containers: known_containers.into_iter().map(Into::into).collect(),
        }
    }

    /// コンテナ名を検証する。空白のみ、または `/` `:` を含む名前はキーにできない。
    pub fn validate_container(container: &str) -> Result<(), ResolveError> {
        if container.trim().is_empty() {
            return Err(ResolveError::Normalization("コンテナ名が空です".to_string()));
        }
        if container.contains(['/', ':']) {
            return Err(ResolveError::Normalization(format!(
                "コンテナ名に使用できない文字が含まれています: {container}"
            )));
        }
        Ok(())
    }

    /// パスを正規化する。
    ///
    /// 1. `http://` / `https://` で始まる場合は入力をそのまま `Absolute` として返す
    /// 2. 対象コンテナ名および既知のコンテナ名の `"<name>/"` プレフィックスを、
    ///    どれも一致しなくなるまで除去する
    /// 3. 残りを `Relative` として返す（空、または `..` を含む場合はエラー）
    ///
    /// コンテナ名が不正な場合もエラー（`validate_container`）。
    pub fn normalize(&self, path: &str, container: &str) -> Result<NormalizedPath, ResolveError> {
        Self::validate_container(container)?;
        self.normalize_in(path, container)
    }

    /// コンテナを特定せずに正規化する。既知のコンテナ名のみを除去する。
    ///
    /// コンテナ未指定の削除で使う。
    pub fn normalize_unscoped(&self, path: &str) -> Result<NormalizedPath, ResolveError> {
        self.normalize_in(path, "")
    }

    fn normalize_in(&self, path: &str, container: &str) -> Result<NormalizedPath, ResolveError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::Normalization("パスが空です".to_string()));
        }
        if is_absolute_url(trimmed) {
            return Ok(NormalizedPath::Absolute(path.to_string()));
        }

        let names = std::iter::once(container)
            .chain(self.known_containers.iter().map(String::as_str))
            .filter(|name| !name.is_empty());

        let mut rest = trimmed.trim_start_matches('/');
        loop {
            let stripped = names.clone().find_map(|name| {
                rest.strip_prefix(name)
                    .and_then(|r| r.strip_prefix('/'))
            });
            match stripped {
                Some(r) => rest = r.trim_start_matches('/'),
                None => break,
            }
        }

        if rest.is_empty() {
            return Err(ResolveError::Normalization(format!(
                "コンテナ名のみでファイルパスがありません: {path}"
            )));
        }
        if rest.split('/').any(|segment| segment == "..") {
            return Err(ResolveError::Normalization(format!(
                "親ディレクトリ参照を含むパスは解決できません: {path}"
            )));
        }

        Ok(NormalizedPath::Relative(rest.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> PathNormalizer {
        PathNormalizer::new(["images", "videos"])
    }

    /// 絶対URLはそのまま返されることを確認
    #[test]
    fn test_absolute_passthrough() {
        let n = normalizer();
        let url = "https://cdn.example.com/a.png?token=x";
        assert_eq!(
            n.normalize(url, "images").unwrap(),
            NormalizedPath::Absolute(url.to_string())
        );
        assert_eq!(
            n.normalize("HTTP://example.com/a", "images").unwrap(),
            NormalizedPath::Absolute("HTTP://example.com/a".to_string())
        );
    }

    /// 対象コンテナ名のプレフィックスが除去されることを確認
    #[test]
    fn test_strips_target_container() {
        let n = normalizer();
        assert_eq!(
            n.normalize("workspace-temp/a/b.png", "workspace-temp").unwrap(),
            NormalizedPath::Relative("a/b.png".to_string())
        );
    }

    /// 旧来のコンテナ名や先頭スラッシュも除去されることを確認
    #[test]
    fn test_strips_legacy_and_nested_prefixes() {
        let n = normalizer();
        assert_eq!(
            n.normalize("/images/generated-images/x.png", "generated-images").unwrap(),
            NormalizedPath::Relative("x.png".to_string())
        );
        // "images-archive/" は "images/" と一致しない
        assert_eq!(
            n.normalize("images-archive/x.png", "generated-images").unwrap(),
            NormalizedPath::Relative("images-archive/x.png".to_string())
        );
    }

    /// 正規化が冪等であることを確認
    #[test]
    fn test_normalize_is_idempotent() {
        let n = normalizer();
        for input in [
            "images/workspace-temp/a.png",
            "workspace-temp/images/b/c.png",
            "plain/path.png",
        ] {
            let NormalizedPath::Relative(once) = n.normalize(input, "workspace-temp").unwrap()
            else {
                panic!("相対パスであるべき");
            };
            let twice = n.normalize(&once, "workspace-temp").unwrap();
            assert_eq!(twice, NormalizedPath::Relative(once));
        }
    }

    /// 空パス・コンテナ名のみ・親ディレクトリ参照はエラーになることを確認
    #[test]
    fn test_invalid_paths_rejected() {
        let n = normalizer();
        for input in ["", "   ", "images/", "workspace-temp/", "a/../b.png"] {
            assert!(
                matches!(
                    n.normalize(input, "workspace-temp"),
                    Err(ResolveError::Normalization(_))
                ),
                "{input:?} はエラーになるべき"
            );
        }
    }

    /// 空・区切り文字を含むコンテナ名はエラーになることを確認
    #[test]
    fn test_invalid_container_rejected() {
        let n = normalizer();
        for container in ["", "  ", "a/b", "images:old"] {
            assert!(
                matches!(
                    n.normalize("a.png", container),
                    Err(ResolveError::Normalization(_))
                ),
                "{container:?} はエラーになるべき"
            );
        }
        // 絶対URLでもコンテナ名は検証される
        assert!(n.normalize("https://cdn.example/a.png", "").is_err());
    }

    /// コンテナ未指定の正規化は既知のコンテナ名だけを除去することを確認
    #[test]
    fn test_normalize_unscoped() {
        let n = normalizer();
        assert_eq!(
            n.normalize_unscoped("images/a.png").unwrap(),
            NormalizedPath::Relative("a.png".to_string())
        );
        assert_eq!(
            n.normalize_unscoped("workspace-temp/a.png").unwrap(),
            NormalizedPath::Relative("workspace-temp/a.png".to_string())
        );
    }
}
