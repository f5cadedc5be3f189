//! 集成测试：完整的认证闸门流程
//!
//! 覆盖从玩家连接、注册、登录、失败锁定到管理员干预的完整生命周期。

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authgate::config::GateConfig;
use authgate::error::{Error, PolicyError, Result, StorageError, ValidationError};
use authgate::gate::ActivityKind;
use authgate::orchestrator::{AuthOrchestrator, ConnectOutcome, LoginOutcome};
use authgate::password::{Algorithm, PasswordHasher};
use authgate::security::LockoutConfig;
use authgate::store::{
    Credential, CredentialStore, FileCredentialStore, RecoveryQa, TwoFactorRecord,
};
use uuid::Uuid;

/// 低成本哈希参数，避免集成测试被散列拖慢
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

/// 每个方法都报 I/O 失败的存储桩
struct OfflineStore;

fn offline() -> Error {
    StorageError::Io("store offline".into()).into()
}

#[async_trait]
impl CredentialStore for OfflineStore {
    async fn get_credential(&self, _identity: &Uuid) -> Result<Option<Credential>> {
        Err(offline())
    }

    async fn set_credential(&self, _credential: Credential) -> Result<()> {
        Err(offline())
    }

    async fn delete_credential(&self, _identity: &Uuid) -> Result<()> {
        Err(offline())
    }

    async fn get_two_factor(&self, _identity: &Uuid) -> Result<Option<TwoFactorRecord>> {
        Err(offline())
    }

    async fn set_two_factor(&self, _record: TwoFactorRecord) -> Result<()> {
        Err(offline())
    }

    async fn delete_two_factor(&self, _identity: &Uuid) -> Result<()> {
        Err(offline())
    }

    async fn get_recovery_qa(&self, _identity: &Uuid) -> Result<Option<RecoveryQa>> {
        Err(offline())
    }

    async fn set_recovery_qa(&self, _qa: RecoveryQa) -> Result<()> {
        Err(offline())
    }

    async fn delete_recovery_qa(&self, _identity: &Uuid) -> Result<()> {
        Err(offline())
    }
}

/// 测试完整的玩家生命周期：连接、注册、掉线、重连、登录、登出
#[tokio::test]
async fn test_full_player_lifecycle() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    // 1. 新玩家连接，等待注册
    let outcome = gate.on_connect(steve, "steve", addr(1)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::AwaitingRegistration);

    // 2. 认证前所有行为被拦截
    for kind in [
        ActivityKind::Chat,
        ActivityKind::Move,
        ActivityKind::Build,
        ActivityKind::Break,
        ActivityKind::Interact,
    ] {
        let decision = gate.on_activity(&steve, kind);
        assert!(!decision.allowed, "{:?} should be blocked before auth", kind);
        assert!(decision.message.is_some());
    }

    // 3. 注册后立即登录并放行
    gate.register(steve, "steve", addr(1), "hunter42", "hunter42")
        .await
        .unwrap();
    assert!(gate.is_authenticated(&steve));
    assert!(gate.on_activity(&steve, ActivityKind::Build).allowed);

    // 4. 掉线丢会话
    gate.on_disconnect(&steve);
    assert!(!gate.is_authenticated(&steve));

    // 5. 重连后等待登录而不是注册
    let outcome = gate.on_connect(steve, "steve", addr(1)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::AwaitingLogin);

    // 6. 正确密码回到已认证状态
    let outcome = gate.login(steve, addr(1), "hunter42").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
    assert!(gate.on_activity(&steve, ActivityKind::Chat).allowed);

    // 7. 登出后重新被闸门拦住
    assert!(gate.logout(&steve));
    assert!(!gate.on_activity(&steve, ActivityKind::Chat).allowed);
}

/// 测试渐进式锁定：失败计数、锁定、管理员解锁
#[tokio::test]
async fn test_lockout_and_admin_unlock() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(2), "hunter42", "hunter42")
        .await
        .unwrap();
    gate.logout(&steve);

    // 场景1：失败递减剩余次数
    let err = gate.login(steve, addr(2), "wrong1").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Policy(PolicyError::InvalidPassword {
            attempts_remaining: 2
        })
    ));
    let err = gate.login(steve, addr(2), "wrong2").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Policy(PolicyError::InvalidPassword {
            attempts_remaining: 1
        })
    ));

    // 场景2：第三次失败触发锁定
    let err = gate.login(steve, addr(2), "wrong3").await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::LockedOut { .. })));
    assert!(gate.limiter().is_identity_locked(&steve));
    assert_eq!(gate.stats().snapshot().lockouts, 1);

    // 场景3：锁定期内正确密码也被拒绝
    let err = gate.login(steve, addr(2), "hunter42").await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::LockedOut { .. })));

    // 场景4：管理员解锁后立即可以登录
    gate.unlock(&steve);
    assert!(!gate.limiter().is_identity_locked(&steve));
    let outcome = gate.login(steve, addr(2), "hunter42").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试地址维度的锁定：同一 IP 上多个身份的失败会累积
#[tokio::test]
async fn test_shared_address_lockout() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let shared = addr(3);

    gate.register(alice, "alice", shared, "hunter42", "hunter42")
        .await
        .unwrap();
    gate.register(bob, "bob", shared, "hunter42", "hunter42")
        .await
        .unwrap();
    gate.logout(&alice);
    gate.logout(&bob);

    // alice 两次失败，身份还没锁，地址已累计两次
    gate.login(alice, shared, "wrong").await.unwrap_err();
    gate.login(alice, shared, "wrong").await.unwrap_err();
    assert!(!gate.limiter().is_identity_locked(&alice));

    // bob 的第一次失败是地址的第三次，地址被锁
    let err = gate.login(bob, shared, "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::IpLockedOut { .. })));
    assert!(gate.limiter().is_address_locked(&shared));

    // 此后该地址上即使密码正确也被拒绝
    let err = gate.login(bob, shared, "hunter42").await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::IpLockedOut { .. })));

    // 换一个地址不受影响
    let outcome = gate.login(bob, addr(4), "hunter42").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试白名单地址豁免地址锁定但不豁免身份锁定
#[tokio::test]
async fn test_whitelist_exempts_address_tracking() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let lan = addr(5);

    gate.register(alice, "alice", lan, "hunter42", "hunter42")
        .await
        .unwrap();
    gate.register(bob, "bob", lan, "hunter42", "hunter42")
        .await
        .unwrap();
    gate.logout(&alice);
    gate.logout(&bob);

    gate.ip_filter().whitelist_add(lan);

    // 两个身份各失败两次，地址不积累计数
    for _ in 0..2 {
        gate.login(alice, lan, "wrong").await.unwrap_err();
        gate.login(bob, lan, "wrong").await.unwrap_err();
    }
    assert!(!gate.limiter().is_address_locked(&lan));

    // 身份维度照常：第三次失败锁定 alice 本人
    let err = gate.login(alice, lan, "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::LockedOut { .. })));

    // bob 不受 alice 锁定影响
    let outcome = gate.login(bob, lan, "hunter42").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试黑名单地址整体拒绝
#[tokio::test]
async fn test_blacklist_blocks_connection_and_login() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();
    let banned = addr(6);

    gate.register(steve, "steve", addr(7), "hunter42", "hunter42")
        .await
        .unwrap();
    gate.logout(&steve);

    gate.ip_filter().blacklist_add(banned);

    // 连接直接给出拒绝建议
    let outcome = gate.on_connect(steve, "steve", banned).await.unwrap();
    assert!(matches!(outcome, ConnectOutcome::Blocked { .. }));

    // 登录同样被拒
    let err = gate.login(steve, banned, "hunter42").await.unwrap_err();
    assert!(matches!(err, Error::Policy(PolicyError::Blacklisted)));

    // 移出黑名单后恢复
    gate.ip_filter().blacklist_remove(&banned);
    let outcome = gate.login(steve, banned, "hunter42").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试修改密码与管理员重置
#[tokio::test]
async fn test_password_maintenance() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(8), "hunter42", "hunter42")
        .await
        .unwrap();

    // 1. 修改密码要求旧密码正确
    let err = gate
        .change_password(steve, "not-the-password", "newpass99", "newpass99")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // 2. 两次输入不一致被拒绝
    let err = gate
        .change_password(steve, "hunter42", "newpass99", "newpass98")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::PasswordMismatch)
    ));

    // 3. 正常修改后旧密码失效
    gate.change_password(steve, "hunter42", "newpass99", "newpass99")
        .await
        .unwrap();
    gate.logout(&steve);
    gate.login(steve, addr(8), "hunter42").await.unwrap_err();
    let outcome = gate.login(steve, addr(8), "newpass99").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);

    // 4. 管理员重置强制登出并清空锁定
    gate.admin_reset_password(steve, "reset-by-admin")
        .await
        .unwrap();
    assert!(!gate.is_authenticated(&steve));
    let outcome = gate.login(steve, addr(8), "reset-by-admin").await.unwrap();
    assert_eq!(outcome, LoginOutcome::LoggedIn);
}

/// 测试删除账号后同一身份可以重新注册
#[tokio::test]
async fn test_delete_account_allows_reregistration() {
    let gate = AuthOrchestrator::new(test_config()).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(9), "hunter42", "hunter42")
        .await
        .unwrap();
    gate.delete_account(&steve).await.unwrap();

    assert!(!gate.is_registered(&steve).await.unwrap());
    assert!(!gate.is_authenticated(&steve));

    let outcome = gate.on_connect(steve, "steve", addr(9)).await.unwrap();
    assert_eq!(outcome, ConnectOutcome::AwaitingRegistration);

    gate.register(steve, "steve", addr(9), "second-life", "second-life")
        .await
        .unwrap();
    assert!(gate.is_authenticated(&steve));
}

/// 测试文件存储：凭据跨重启存活
#[tokio::test]
async fn test_credentials_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    let steve = Uuid::new_v4();

    // 第一次启动：注册
    {
        let store = Arc::new(FileCredentialStore::open(&path).await.unwrap());
        let gate = AuthOrchestrator::with_store(test_config(), store).unwrap();
        gate.register(steve, "steve", addr(10), "hunter42", "hunter42")
            .await
            .unwrap();
    }

    // 第二次启动：凭据还在，锁定和会话状态不在
    {
        let store = Arc::new(FileCredentialStore::open(&path).await.unwrap());
        let gate = AuthOrchestrator::with_store(test_config(), store).unwrap();

        assert!(gate.is_registered(&steve).await.unwrap());
        assert!(!gate.is_authenticated(&steve));

        let outcome = gate.login(steve, addr(10), "hunter42").await.unwrap();
        assert_eq!(outcome, LoginOutcome::LoggedIn);
    }
}

/// 测试存储故障：读写失败原样上报，不落入未注册分支也不建立会话
#[tokio::test]
async fn test_store_failure_surfaces_storage_error() {
    let gate = AuthOrchestrator::with_store(test_config(), Arc::new(OfflineStore)).unwrap();
    let steve = Uuid::new_v4();

    // 1. 注册在查重读取时就失败
    let err = gate
        .register(steve, "steve", addr(12), "hunter42", "hunter42")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::Io(_))));
    assert!(!gate.is_authenticated(&steve));

    // 2. 登录同样上报存储错误，而不是按未注册处理
    let err = gate.login(steve, addr(12), "hunter42").await.unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::Io(_))));
    assert!(!gate.is_authenticated(&steve));

    // 3. 注册状态查询拒绝回答而不是默认否
    assert!(gate.is_registered(&steve).await.is_err());
}

/// 测试后台清扫：闲置会话过期、锁定窗口遗忘
#[tokio::test]
async fn test_background_sweep_expires_idle_sessions() {
    let config = test_config()
        .with_session(
            authgate::session::SessionConfig::default()
                .with_idle_timeout(Duration::from_millis(80)),
        )
        .with_lockout(
            LockoutConfig::default()
                .with_lockout_duration(Duration::from_millis(50))
                .with_attempt_window(Duration::from_millis(50)),
        )
        .with_sweep_interval(Duration::from_millis(30));
    let gate = AuthOrchestrator::new(config).unwrap();
    let steve = Uuid::new_v4();

    gate.register(steve, "steve", addr(11), "hunter42", "hunter42")
        .await
        .unwrap();
    assert!(gate.is_authenticated(&steve));

    gate.start();

    // 闲置超过上限后被清扫掉线
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!gate.is_authenticated(&steve));
    assert!(gate.stats().snapshot().expired_sessions >= 1);

    gate.stop();
}
