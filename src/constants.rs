/// Application constants

// Network (BNB Smart Chain mainnet)
pub const DEFAULT_CHAIN_ID: u64 = 56;
pub const DEFAULT_CHAIN_NAME: &str = "Binance Smart Chain Mainnet";
pub const DEFAULT_CHAIN_RPC_URL: &str = "https://bsc-dataseed.binance.org/";
pub const DEFAULT_NATIVE_CURRENCY_NAME: &str = "BNB";
pub const DEFAULT_NATIVE_CURRENCY_SYMBOL: &str = "BNB";
pub const DEFAULT_NATIVE_CURRENCY_DECIMALS: u8 = 18;
pub const DEFAULT_BLOCK_EXPLORER_URL: &str = "https://bscscan.com";

// EIP-1193 / EIP-3085 wallet error codes
pub const WALLET_ERROR_UNRECOGNIZED_CHAIN: i64 = 4902;
pub const WALLET_ERROR_USER_REJECTED: i64 = 4001;

// Art endpoints
pub const DEFAULT_CHARACTER_IMAGE_BASE_URL: &str = "https://app.apocgame.io/NFT/character";
pub const DEFAULT_MOBSTER_IMAGE_BASE_URL: &str = "https://app.apocgame.io/NFT/mobster";

// Combat formula
pub const HP_REQUIRED_PER_LEVEL: u64 = 10;
pub const SUCCESS_RATE_SCALE: f64 = 100.0;
pub const SUCCESS_RATE_MAX_PERCENT: f64 = 100.0;

// Rewards (18-decimal fixed point, paid out in BUSD)
pub const REWARD_TOKEN_DECIMALS: u32 = 18;
pub const REWARD_DISPLAY_DECIMALS: u32 = 2;
pub const REWARD_CURRENCY_LABEL: &str = "BUSD";

// RPC hardening
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 180;

// Observer channel capacity for per-field notifications
pub const FIELD_UPDATE_CHANNEL_CAPACITY: usize = 64;
