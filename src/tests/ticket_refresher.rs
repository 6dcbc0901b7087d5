#[cfg(test)]
mod test {

    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::renewal::TicketRefresher;
    use crate::tests::common::{wait_until, FakeIdentityLibrary};

    #[tokio::test]
    async fn tick_skips_relogin_while_tgt_is_fresh() {
        let library = Arc::new(FakeIdentityLibrary::new("svc"));
        let refresher = TicketRefresher::new(library.clone(), Duration::from_secs(60), CancellationToken::new());

        assert!(!refresher.tick().await.unwrap());
        assert_eq!(library.relogins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tick_relogins_when_due() {
        let library = Arc::new(FakeIdentityLibrary::new("svc"));
        library.needs_renewal.store(true, Ordering::SeqCst);
        let refresher = TicketRefresher::new(library.clone(), Duration::from_secs(60), CancellationToken::new());

        assert!(refresher.tick().await.unwrap());
        assert_eq!(library.relogins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_relogin_is_reported_and_retried_next_period() {
        let library = Arc::new(FakeIdentityLibrary::new("svc"));
        library.needs_renewal.store(true, Ordering::SeqCst);
        library.fail_relogin.store(true, Ordering::SeqCst);
        let refresher = TicketRefresher::new(library.clone(), Duration::from_secs(60), CancellationToken::new());
        assert!(refresher.tick().await.is_err());

        library.fail_relogin.store(false, Ordering::SeqCst);
        assert!(refresher.tick().await.unwrap());
    }

    #[tokio::test]
    async fn refresher_runs_periodically_until_cancelled() {
        let library = Arc::new(FakeIdentityLibrary::new("svc"));
        library.needs_renewal.store(true, Ordering::SeqCst);
        // a failing relogin must not stop the loop
        library.fail_relogin.store(true, Ordering::SeqCst);
        let shutdown = CancellationToken::new();
        let handle = TicketRefresher::new(library.clone(), Duration::from_millis(15), shutdown.clone()).start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        library.fail_relogin.store(false, Ordering::SeqCst);
        assert!(wait_until(|| library.relogins.load(Ordering::SeqCst) >= 2, Duration::from_secs(5)).await);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
