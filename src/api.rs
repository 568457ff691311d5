pub mod time_source; // 開始・終了時刻の取得
pub mod youtube; // ホストページのメタデータ抽出
