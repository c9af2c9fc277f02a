//! 테이블 크기 지표.

/// 테이블 저장 공간 지표 (바이트).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetrics {
    /// 테이블 이름
    pub table: String,
    /// 인덱스/TOAST 포함 전체 크기
    pub size: i64,
    /// 본 테이블을 제외한 크기 (인덱스, TOAST)
    pub external_size: i64,
}

impl TableMetrics {
    /// 로그용 요약 문자열. 예: `klines 1.5 GB (external 320 MB)`
    pub fn summary(&self) -> String {
        format!(
            "{} {} (external {})",
            self.table,
            format_bytes(self.size),
            format_bytes(self.external_size)
        )
    }
}

/// 바이트 수를 1024 단위로 읽기 쉽게 표시.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes.max(0) as f64;
    let mut order = 0;
    while size >= 1024.0 && order < UNITS.len() - 1 {
        size /= 1024.0;
        order += 1;
    }

    if order == 0 {
        format!("{} {}", size as i64, UNITS[order])
    } else {
        let rounded = (size * 100.0).round() / 100.0;
        format!("{} {}", rounded, UNITS[order])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
        assert_eq!(format_bytes(-10), "0 B");
    }

    #[test]
    fn test_summary() {
        let metrics = TableMetrics {
            table: "klines".to_string(),
            size: 3 * 1024 * 1024,
            external_size: 512 * 1024,
        };
        assert_eq!(metrics.summary(), "klines 3 MB (external 512 KB)");
    }
}
