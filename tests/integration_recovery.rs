//! 集成测试：账号找回
//!
//! 测试找回令牌的签发、消耗、过期以及安全问题兜底流程。

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use authgate::config::GateConfig;
use authgate::error::{Error, PolicyError, ValidationError};
use authgate::orchestrator::{AuthOrchestrator, LoginOutcome};
use authgate::password::{Algorithm, PasswordHasher};
use authgate::recovery::RecoveryConfig;
use authgate::store::FileCredentialStore;
use uuid::Uuid;

fn fast_hasher() -> PasswordHasher {
    #[cfg(feature = "argon2")]
    {
        PasswordHasher::new(Algorithm::Argon2id).with_argon2_params(1024, 2, 1)
    }
    #[cfg(all(feature = "bcrypt", not(feature = "argon2")))]
    {
        PasswordHasher::new(Algorithm::Bcrypt).with_bcrypt_cost(4)
    }
}

fn test_config() -> GateConfig {
    GateConfig::new()
        .with_hasher(fast_hasher())
        .with_premium_auto_login(false)
}

fn addr(last: u8) -> IpAddr {
    IpAddr::from([203, 0, 113, last])
}

/// 测试令牌找回的完整流程
#[tokio::test]
async fn test_token_recovery_flow() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(1), "hunter42", "hunter42")
        .await
        .unwrap();
    gate.logout(&steve);

    // 1. 签发令牌
    let issued = gate.begin_recovery(steve).await.unwrap();
    assert!(!issued.token.is_empty());
    assert_eq!(issued.identity, steve);

    // 2. 凭令牌设置新密码，返回找回的身份
    let recovered = gate
        .complete_recovery(&issued.token, "fresh-start9", "fresh-start9")
        .await
        .unwrap();
    assert_eq!(recovered, steve);

    // 3. 找回不自动登录
    assert!(!gate.is_authenticated(&steve));

    // 4. 旧密码失效，新密码生效
    gate.login(steve, addr(1), "hunter42").await.unwrap_err();
    let outcome = gate.login(steve, addr(1), "fresh-start9").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);

    // 5. 令牌一次性，重放失败
    let err = gate
        .complete_recovery(&issued.token, "again", "again")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidRecoveryToken)
    ));
}

/// 测试未注册身份不能签发找回令牌
#[tokio::test]
async fn test_recovery_requires_registration() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();

    let err = gate.begin_recovery(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::NotRegistered)));
}

/// 测试密码不合格时令牌不被消耗
#[tokio::test]
async fn test_invalid_password_does_not_burn_token() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(2), "hunter42", "hunter42")
        .await
        .unwrap();
    let issued = gate.begin_recovery(steve).await.unwrap();

    // 1. 两次输入不一致
    let err = gate
        .complete_recovery(&issued.token, "newpass99", "newpass98")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::PasswordMismatch)
    ));

    // 2. 长度不达标
    let err = gate
        .complete_recovery(&issued.token, "abc", "abc")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::PasswordTooShort { .. })
    ));

    // 3. 令牌还活着，合格的密码正常走完
    gate.complete_recovery(&issued.token, "newpass99", "newpass99")
        .await
        .unwrap();
}

/// 测试找回顺带清空锁定状态
#[tokio::test]
async fn test_recovery_clears_lockout() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(3), "hunter42", "hunter42")
        .await
        .unwrap();
    gate.logout(&steve);

    // 玩家忘了密码，试错到锁定
    for _ in 0..3 {
        gate.login(steve, addr(3), "wrong").await.unwrap_err();
    }
    assert!(gate.limiter().is_identity_locked(&steve));
    assert!(gate.limiter().is_address_locked(&addr(3)));

    // 找回完成后身份和地址都解锁，立刻能登录
    let issued = gate.begin_recovery(steve).await.unwrap();
    gate.complete_recovery(&issued.token, "fresh-start9", "fresh-start9")
        .await
        .unwrap();
    assert!(!gate.limiter().is_identity_locked(&steve));
    assert!(!gate.limiter().is_address_locked(&addr(3)));

    let outcome = gate.login(steve, addr(3), "fresh-start9").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试过期令牌被当作不存在
#[tokio::test]
async fn test_expired_token_rejected() {
    let config = test_config()
        .with_recovery(RecoveryConfig::new().with_token_ttl(Duration::from_millis(50)));
    let gate = AuthOrchestrator::new(config).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(4), "hunter42", "hunter42")
        .await
        .unwrap();
    let issued = gate.begin_recovery(steve).await.unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = gate
        .complete_recovery(&issued.token, "newpass99", "newpass99")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidRecoveryToken)
    ));
}

/// 测试删除账号吊销未消耗的找回令牌
#[tokio::test]
async fn test_delete_account_revokes_tokens() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(5), "hunter42", "hunter42")
        .await
        .unwrap();
    let issued = gate.begin_recovery(steve).await.unwrap();

    gate.delete_account(&steve).await.unwrap();

    let err = gate
        .complete_recovery(&issued.token, "newpass99", "newpass99")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidRecoveryToken)
    ));
}

/// 测试安全问题兜底：宿主先核对答案再签发令牌
#[tokio::test]
async fn test_security_question_fallback() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(6), "hunter42", "hunter42")
        .await
        .unwrap();

    // 1. 登录状态下设置问答
    gate.recovery()
        .set_question(&steve, "What is your cat's name?", "Mr. Whiskers")
        .await
        .unwrap();
    gate.logout(&steve);

    // 2. 玩家忘了密码，宿主展示问题
    let question = gate.recovery().question(&steve).await.unwrap();
    assert_eq!(question.as_deref(), Some("What is your cat's name?"));

    // 3. 答案核对不区分大小写和首尾空白
    assert!(!gate.recovery().check_answer(&steve, "garfield").await.unwrap());
    assert!(
        gate.recovery()
            .check_answer(&steve, "  mr. whiskers  ")
            .await
            .unwrap()
    );

    // 4. 答对后按正常令牌流程走完
    let issued = gate.begin_recovery(steve).await.unwrap();
    gate.complete_recovery(&issued.token, "newpass99", "newpass99")
        .await
        .unwrap();
    let outcome = gate.login(steve, addr(6), "newpass99").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试安全问答随文件存储跨重启存活，令牌不存活
#[tokio::test]
async fn test_question_persists_tokens_do_not() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let steve = Uuid::new_v4();
    let stale_token;

    // 第一次启动：设置问答并签发令牌
    {
        let store = Arc::new(FileCredentialStore::open(&path).await.unwrap());
        let gate = AuthOrchestrator::with_store(test_config(), store).unwrap();
        gate.register(steve, "steve", addr(7), "hunter42", "hunter42")
            .await
            .unwrap();
        gate.recovery()
            .set_question(&steve, "First pet?", "Rex")
            .await
            .unwrap();
        stale_token = gate.begin_recovery(steve).await.unwrap().token;
    }

    // 第二次启动：问答还在，旧令牌作废
    {
        let store = Arc::new(FileCredentialStore::open(&path).await.unwrap());
        let gate = AuthOrchestrator::with_store(test_config(), store).unwrap();

        assert!(gate.recovery().check_answer(&steve, "rex").await.unwrap());

        let err = gate
            .complete_recovery(&stale_token, "newpass99", "newpass99")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidRecoveryToken)
        ));
    }
}
