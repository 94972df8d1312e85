pub struct Icons;

impl Icons {
    pub const PHONE: &str = "📱";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const KEY: &str = "🔑";
    pub const LOCK: &str = "🔒";
    pub const IMAGE: &str = "🖼️";
    pub const DATABASE: &str = "🗄️";
    pub const PACKAGE: &str = "📦";
    pub const DEL: &str = "🗑️";
    pub const MUSIC: &str = "🎵";
    pub const GLOBE: &str = "🌐";
    pub const MOVE: &str = "🚚";
    pub const STATS: &str = "📊";
}
