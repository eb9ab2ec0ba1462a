//! 确认码生成
//!
//! 格式：类型前缀 + 6 位随机数字 (`R042917` / `W000318`)。
//! 与已持久化的确认码冲突时重试，最多 [`MAX_CODE_ATTEMPTS`] 次，
//! 用尽后返回 [`AppError::Generation`] 并记录告警，不做无限重试。

use rand::Rng;
use shared::models::ReservationKind;

use crate::db::ReservationStorage;
use crate::utils::{AppError, AppResult};

pub const MAX_CODE_ATTEMPTS: u32 = 3;

const CODE_DIGITS: u32 = 6;

/// 确认码候选来源
pub trait CodeGenerator: Send + Sync {
    fn candidate(&self, kind: ReservationKind) -> String;
}

/// 随机数字确认码
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn candidate(&self, kind: ReservationKind) -> String {
        let n: u32 = rand::thread_rng().gen_range(0..10u32.pow(CODE_DIGITS));
        format!("{}{:06}", kind.code_prefix(), n)
    }
}

/// 生成一个尚未被占用的确认码
///
/// 需在创建临界区内调用，检查与插入之间不会有别的创建者。
pub fn issue_code(
    generator: &dyn CodeGenerator,
    storage: &ReservationStorage,
    kind: ReservationKind,
) -> AppResult<String> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generator.candidate(kind);
        if !storage.code_exists(&code)? {
            return Ok(code);
        }
        tracing::warn!(attempt, code = %code, "Confirmation code collision");
    }

    crate::alarm_log!(
        kind = %kind,
        attempts = MAX_CODE_ATTEMPTS,
        "Confirmation code generation exhausted"
    );
    Err(AppError::Generation(MAX_CODE_ATTEMPTS))
}
